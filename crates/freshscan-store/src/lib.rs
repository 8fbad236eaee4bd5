//! # freshscan-store
//!
//! SQLite persistence for FreshScan. The crate exposes a synchronous
//! [`Database`] handle wrapping a `rusqlite::Connection` with typed helpers
//! for accounts, scan records, per-owner statistics and the on-device
//! recent-scans cache.
//!
//! The handle is not `Sync`; async callers share it behind a mutex and run
//! calls on a blocking thread.

pub mod accounts;
pub mod database;
pub mod migrations;
pub mod models;
pub mod recent;
pub mod scans;
pub mod stats;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use scans::{PageRequest, ScanFilter, ScanPage, SqlWhere};
