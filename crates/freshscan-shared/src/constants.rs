/// Maximum accepted upload size in bytes (10 MiB)
pub const MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Default page size for scan history
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// Minimum secret length accepted at registration
pub const MIN_SECRET_LEN: usize = 8;

/// Maximum display name length (in characters)
pub const MAX_NAME_LEN: usize = 100;

/// Default session lifetime in hours (7 days)
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 7 * 24;

/// Longest accepted session lifetime in hours (10 years)
pub const MAX_TOKEN_TTL_HOURS: i64 = 10 * 365 * 24;

/// Number of trailing months reported by the stats endpoint
pub const STATS_MONTHS: u32 = 6;

/// Number of scans kept by the on-device recent-scans cache
pub const RECENT_SCANS_LIMIT: usize = 10;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
