//! In-memory repositories backed by `parking_lot` locks.
//!
//! Uniqueness checks and writes happen under the same write lock, so
//! concurrent creates of the same unique key cannot both succeed.

mod resources;
mod roles;
mod users;

pub use resources::MemoryResourceRepo;
pub use roles::MemoryRoleRepo;
pub use users::MemoryUserRepo;
