use thiserror::Error;

/// Errors returned by [`crate::FreshScanClient`].
#[derive(Debug, Error)]
pub enum Error {
    /// Network failure, DNS resolution, timeout and the like.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server answered with an error body.
    #[error("API error {status} [{kind}]: {message}")]
    Api {
        status: u16,
        /// Stable kind string, e.g. `not_found` or `token_expired`.
        kind: String,
        message: String,
    },

    /// Non-2xx response without a readable error body.
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("failed to deserialize response: {0}")]
    Deserialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The local recent-scans cache failed.
    #[error("local storage error: {0}")]
    Storage(#[from] freshscan_store::StoreError),

    /// A protected call was made before logging in.
    #[error("not logged in")]
    NotLoggedIn,
}

impl Error {
    /// Error kind reported by the server, if any.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Api { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Http { status } => Some(*status),
            _ => None,
        }
    }

    /// `true` when the session is missing, expired or rejected and the user
    /// has to log in again.
    pub fn needs_login(&self) -> bool {
        matches!(self, Self::NotLoggedIn)
            || matches!(
                self.kind(),
                Some("unauthenticated" | "token_expired" | "token_invalid")
            )
    }
}
