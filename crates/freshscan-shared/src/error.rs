use thiserror::Error;

/// Why a session token was rejected.
///
/// Both variants mean "authenticate again"; they are kept apart so clients
/// can show a "session expired" message instead of a generic one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Session token is malformed or its signature is invalid")]
    Invalid,

    #[error("Session token has expired")]
    Expired,
}

/// A string did not name a known variant of one of the domain enums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseKindError {
    pub kind: &'static str,
    pub value: String,
}
