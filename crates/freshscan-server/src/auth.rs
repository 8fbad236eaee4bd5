//! Secret hashing, session tokens and the bearer-token extractor.

use std::sync::LazyLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use freshscan_shared::constants::{MAX_NAME_LEN, MIN_SECRET_LEN};
use freshscan_shared::session::{
    generate_signing_key, issue_session_token, validate_session_token, SessionClaims,
};
use freshscan_shared::TokenError;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::state::AppState;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

/// Hashes and verifies account secrets and signs session tokens.
pub struct Authenticator {
    argon2: Argon2<'static>,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    token_ttl: Duration,
    /// Verified against when an email is unknown, so that lookups for
    /// missing accounts cost the same as for existing ones.
    dummy_hash: String,
}

impl Authenticator {
    pub fn new(
        signing_key: SigningKey,
        token_ttl: Duration,
        memory_kib: u32,
        iterations: u32,
    ) -> Result<Self, ServerError> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| ServerError::Internal(format!("Invalid argon2 parameters: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let verifying_key = signing_key.verifying_key();
        let mut auth = Self {
            argon2,
            signing_key,
            verifying_key,
            token_ttl,
            dummy_hash: String::new(),
        };
        auth.dummy_hash = auth.hash_secret("freshscan-dummy-secret")?;
        Ok(auth)
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let signing_key = match config.token_signing_key {
            Some(bytes) => SigningKey::from_bytes(&bytes),
            None => {
                warn!("TOKEN_SIGNING_KEY not set, sessions will not survive a restart");
                generate_signing_key()
            }
        };
        let token_ttl = Duration::try_hours(config.token_ttl_hours).ok_or_else(|| {
            ServerError::Internal(format!(
                "Token lifetime of {} hours is out of range",
                config.token_ttl_hours
            ))
        })?;
        Self::new(
            signing_key,
            token_ttl,
            config.argon2_memory_kib,
            config.argon2_iterations,
        )
    }

    /// Hash a secret into a PHC string with a fresh random salt.
    pub fn hash_secret(&self, secret: &str) -> Result<String, ServerError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServerError::Internal(format!("Failed to hash secret: {e}")))
    }

    /// Check `secret` against a stored hash. With no stored hash the dummy
    /// hash is checked instead and the result is always `false`.
    pub fn verify_secret(&self, stored_hash: Option<&str>, secret: &str) -> bool {
        let (hash, known) = match stored_hash {
            Some(hash) => (hash, true),
            None => (self.dummy_hash.as_str(), false),
        };
        let Ok(parsed) = PasswordHash::new(hash) else {
            warn!("Stored secret hash is not a valid PHC string");
            return false;
        };
        let matches = self
            .argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok();
        known && matches
    }

    pub fn issue_token(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(String, SessionClaims), ServerError> {
        issue_session_token(account_id, now, self.token_ttl, &self.signing_key).ok_or_else(|| {
            ServerError::Internal("Session expiry is out of the representable range".to_string())
        })
    }

    pub fn validate_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, TokenError> {
        validate_session_token(token, &self.verifying_key, now)
    }
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

/// Emails are compared case-insensitively and without surrounding spaces.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), ServerError> {
    if email.len() > 254 || !EMAIL_RE.is_match(email) {
        return Err(ServerError::InvalidInput("Invalid email address".to_string()));
    }
    Ok(())
}

/// Trim a display name and check its length.
pub fn validate_name(name: &str) -> Result<String, ServerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServerError::InvalidInput("Name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServerError::InvalidInput(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub fn validate_secret(secret: &str) -> Result<(), ServerError> {
    if secret.chars().count() < MIN_SECRET_LEN {
        return Err(ServerError::InvalidInput(format!(
            "Secret must be at least {MIN_SECRET_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// The account a request was authenticated as.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub account_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ServerError::Unauthenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ServerError::Unauthenticated)?;

        let claims = state.auth.validate_token(token, Utc::now()).map_err(|e| {
            debug!(error = %e, "Rejected session token");
            ServerError::Token(e)
        })?;

        Ok(AuthUser {
            account_id: claims.sub,
        })
    }
}

/// `axum::Json` with rejections reported as `invalid_input`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ServerError {
    ServerError::InvalidInput(rejection.body_text())
}
