//! Downstream forwarding.
//!
//! Requests that pass the enforcement point and are not handled locally are
//! forwarded to the route whose prefix matches, carrying the caller's
//! delegated credential when one is available.

mod proxy;
mod relay;

pub use proxy::{Forwarded, GatewayProxy};
pub use relay::{CredentialRelay, InMemoryTokenStore, TokenStore};
