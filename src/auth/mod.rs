//! Caller identity.
//!
//! Bearer tokens are verified upstream by an identity-aware proxy, which
//! forwards the verified subject and realm roles in trusted headers. This
//! module turns those headers into a [`Principal`].

mod error;
mod principal;

pub use error::AuthError;
pub use principal::Principal;
