mod authz;
mod request_id;

pub use authz::authz_middleware;
pub use request_id::request_id_middleware;
