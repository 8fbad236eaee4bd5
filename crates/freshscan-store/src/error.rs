use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none, or the row belongs
    /// to a different owner.
    #[error("Record not found")]
    NotFound,

    /// An account with this email already exists.
    #[error("An account with this email already exists")]
    DuplicateAccount,

    /// The owner referenced by a new scan does not exist.
    #[error("Owner account does not exist")]
    OwnerMissing,

    /// A value violates a model invariant (score range, confidence, ...).
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A caller-supplied filter or page request is out of range.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// JSON column (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Extended result code of a failed constraint, if `err` is one.
pub(crate) fn constraint_code(err: &rusqlite::Error) -> Option<std::os::raw::c_int> {
    match err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(code.extended_code)
        }
        _ => None,
    }
}

/// Collapse "no rows" into [`StoreError::NotFound`].
pub(crate) fn not_found(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}
