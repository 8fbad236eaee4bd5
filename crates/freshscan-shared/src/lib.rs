//! # freshscan-shared
//!
//! Types shared between the FreshScan server, its store and the API client:
//! domain enumerations, limits, signed session tokens and the JSON wire
//! shapes of the HTTP API.

pub mod api;
pub mod constants;
pub mod error;
pub mod session;
pub mod types;

pub use error::{ParseKindError, TokenError};
pub use types::{ContentType, Freshness, NutritionClass};
