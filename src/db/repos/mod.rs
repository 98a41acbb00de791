mod resources;
mod roles;
mod users;

pub use resources::*;
pub use roles::*;
pub use users::*;
