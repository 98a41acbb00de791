//! Warden: a path-authorizing gateway with an identity administration
//! service.
//!
//! Requests are authorized against an in-memory registry of Ant-style path
//! mappings (first match by priority wins, role intersection decides), then
//! forwarded downstream with the caller's delegated credential. The admin
//! API manages the users, roles and resources behind those mappings and
//! mirrors them to an external identity provider.

mod api_types;
mod app;
pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod gateway;
pub mod idp;
mod middleware;
pub mod models;
pub mod observability;
mod routes;
pub mod services;

#[cfg(test)]
mod tests;

pub use app::{AppState, build_app};
