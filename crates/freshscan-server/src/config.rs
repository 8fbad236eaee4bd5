//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use freshscan_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_TOKEN_TTL_HOURS, MAX_TOKEN_TTL_HOURS, MAX_UPLOAD_SIZE,
};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./freshscan.db`
    pub database_path: PathBuf,

    /// Directory where uploaded files are stored.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./uploads`
    pub blob_storage_path: PathBuf,

    /// Ed25519 secret key used to sign session tokens (hex-encoded, 64 chars).
    /// Env: `TOKEN_SIGNING_KEY`
    /// Default: none, a random key is generated per process (tokens do not
    /// survive a restart).
    pub token_signing_key: Option<[u8; 32]>,

    /// Session lifetime in hours.
    /// Env: `TOKEN_TTL_HOURS`
    /// Default: `168` (7 days), at most 10 years
    pub token_ttl_hours: i64,

    /// Maximum upload size in bytes (10 MiB).
    pub max_upload_size: u64,

    /// Simulated latency of the synthetic analyzer.
    /// Env: `ANALYSIS_DELAY_MS`
    /// Default: `2000`
    pub analysis_delay: Duration,

    /// Upper bound on one analysis call.
    /// Env: `ANALYSIS_TIMEOUT_SECS`
    /// Default: `30`
    pub analysis_timeout: Duration,

    /// Seed for the synthetic analyzer (deterministic output).
    /// Env: `ANALYSIS_SEED`
    /// Default: unset (seeded from entropy)
    pub analysis_seed: Option<u64>,

    /// Argon2 memory cost in KiB for secret hashing.
    /// Env: `ARGON2_MEMORY_KIB`
    /// Default: `19456` (the argon2 crate's default)
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count.
    /// Env: `ARGON2_ITERATIONS`
    /// Default: `2`
    pub argon2_iterations: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./freshscan.db"),
            blob_storage_path: PathBuf::from("./uploads"),
            token_signing_key: None,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            max_upload_size: MAX_UPLOAD_SIZE,
            analysis_delay: Duration::from_millis(2000),
            analysis_timeout: Duration::from_secs(30),
            analysis_seed: None,
            argon2_memory_kib: argon2::Params::DEFAULT_M_COST,
            argon2_iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

// Hand-written so the signing key never reaches the logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("blob_storage_path", &self.blob_storage_path)
            .field(
                "token_signing_key",
                &self.token_signing_key.map(|_| "<redacted>"),
            )
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("max_upload_size", &self.max_upload_size)
            .field("analysis_delay", &self.analysis_delay)
            .field("analysis_timeout", &self.analysis_timeout)
            .field("analysis_seed", &self.analysis_seed)
            .field("argon2_memory_kib", &self.argon2_memory_kib)
            .field("argon2_iterations", &self.argon2_iterations)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Ok(hex_key) = std::env::var("TOKEN_SIGNING_KEY") {
            match parse_hex_key(&hex_key) {
                Ok(key) => config.token_signing_key = Some(key),
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid TOKEN_SIGNING_KEY, using a random key");
                }
            }
        }

        if let Some(hours) = parse_env::<i64>("TOKEN_TTL_HOURS") {
            match checked_token_ttl(hours) {
                Some(hours) => config.token_ttl_hours = hours,
                None => tracing::warn!(
                    hours,
                    max = MAX_TOKEN_TTL_HOURS,
                    "TOKEN_TTL_HOURS out of range, using default"
                ),
            }
        }

        if let Some(ms) = parse_env::<u64>("ANALYSIS_DELAY_MS") {
            config.analysis_delay = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_env::<u64>("ANALYSIS_TIMEOUT_SECS") {
            config.analysis_timeout = Duration::from_secs(secs.max(1));
        }

        if let Some(seed) = parse_env::<u64>("ANALYSIS_SEED") {
            config.analysis_seed = Some(seed);
        }

        if let Some(kib) = parse_env::<u32>("ARGON2_MEMORY_KIB") {
            config.argon2_memory_kib = kib.max(argon2::Params::MIN_M_COST);
        }

        if let Some(iterations) = parse_env::<u32>("ARGON2_ITERATIONS") {
            config.argon2_iterations = iterations.max(1);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Invalid value, using default");
            None
        }
    }
}

/// Session lifetime in hours, if it is positive and no longer than
/// [`MAX_TOKEN_TTL_HOURS`].
fn checked_token_ttl(hours: i64) -> Option<i64> {
    (1..=MAX_TOKEN_TTL_HOURS).contains(&hours).then_some(hours)
}

/// Parse a 64-character hex string into a 32-byte key.
fn parse_hex_key(hex: &str) -> Result<[u8; 32], String> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex.len()));
    }
    let bytes = hex::decode(hex).map_err(|e| format!("invalid hex: {e}"))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
