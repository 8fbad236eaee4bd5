//! # freshscan-server
//!
//! HTTP backend for FreshScan: accounts with stateless session tokens,
//! upload storage, food-scan analysis and per-account scan history.

pub mod accounts;
pub mod analysis;
pub mod api;
pub mod auth;
pub mod blob_store;
pub mod config;
pub mod error;
pub mod scans;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{build_router, serve, serve_on};
pub use config::ServerConfig;
pub use error::ServerError;
pub use state::AppState;
