mod resource;
mod role;
mod user;
mod validators;

pub use resource::*;
pub use role::*;
pub use user::*;
pub use validators::*;
