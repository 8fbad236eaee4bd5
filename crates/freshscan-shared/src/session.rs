//! Stateless session tokens.
//!
//! A token is `base64url(claims_json) "." base64url(signature)` where the
//! signature is an Ed25519 signature by the server over the encoded claims.
//! Nothing is stored server-side: a token is valid when the signature checks
//! out and `exp` is in the future.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

/// Claims carried inside a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account the token was issued to.
    pub sub: Uuid,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl SessionClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Generate a fresh random signing key (used when no key is configured).
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Issue a token for `account_id` valid for `ttl` starting at `now`.
///
/// Returns `None` when `now + ttl` is not a representable instant.
pub fn issue_session_token(
    account_id: Uuid,
    now: DateTime<Utc>,
    ttl: Duration,
    signing_key: &SigningKey,
) -> Option<(String, SessionClaims)> {
    let expires_at = now.checked_add_signed(ttl)?;
    let claims = SessionClaims {
        sub: account_id,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    // Serializing a struct of a UUID and two integers cannot fail.
    let json = serde_json::to_vec(&claims).unwrap_or_default();
    let payload = URL_SAFE_NO_PAD.encode(json);
    let signature = signing_key.sign(payload.as_bytes());

    let token = format!(
        "{payload}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    );
    Some((token, claims))
}

/// Validate a token against the server's verifying key at time `now`.
///
/// Integrity is checked before expiry, so a tampered token is reported as
/// [`TokenError::Invalid`] even if its (forged) expiry is in the past.
pub fn validate_session_token(
    token: &str,
    verifying_key: &VerifyingKey,
    now: DateTime<Utc>,
) -> Result<SessionClaims, TokenError> {
    let (payload, sig_b64) = token.trim().split_once('.').ok_or(TokenError::Invalid)?;

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenError::Invalid)?;
    let signature = Signature::from_slice(&sig_bytes).map_err(|_| TokenError::Invalid)?;

    verifying_key
        .verify_strict(payload.as_bytes(), &signature)
        .map_err(|_| TokenError::Invalid)?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Invalid)?;
    let claims: SessionClaims = serde_json::from_slice(&json).map_err(|_| TokenError::Invalid)?;

    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}
