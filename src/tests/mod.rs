//! End-to-end tests against the fully assembled router.

mod gateway_e2e;
