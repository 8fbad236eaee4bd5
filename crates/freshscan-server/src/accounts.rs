//! Account operations: registration, credential checks, profile updates and
//! account deletion.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use freshscan_store::Account;

use crate::auth::{normalize_email, validate_email, validate_name, validate_secret};
use crate::error::ServerError;
use crate::state::AppState;

/// Create an account. Everything is validated before the secret is hashed.
pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    secret: String,
) -> Result<Account, ServerError> {
    let name = validate_name(name)?;
    let email = normalize_email(email);
    validate_email(&email)?;
    validate_secret(&secret)?;

    let hash = state
        .with_auth(move |auth| auth.hash_secret(&secret))
        .await?;

    let account = state
        .with_db(move |db| db.insert_account(&email, &name, &hash, Utc::now()))
        .await?;

    info!(account_id = %account.id, "Account registered");
    Ok(account)
}

/// Check an email/secret pair.
///
/// Unknown emails and wrong secrets both yield
/// [`ServerError::InvalidCredentials`], and both run one hash verification.
pub async fn verify_credentials(
    state: &AppState,
    email: &str,
    secret: String,
) -> Result<Account, ServerError> {
    let email = normalize_email(email);
    let credential = state
        .with_db(move |db| db.find_credential_by_email(&email))
        .await?;

    let (account, stored_hash) = match credential {
        Some(c) => (Some(c.account), Some(c.password_hash)),
        None => (None, None),
    };

    let valid = state
        .with_auth(move |auth| Ok(auth.verify_secret(stored_hash.as_deref(), &secret)))
        .await?;

    match account {
        Some(account) if valid => Ok(account),
        _ => Err(ServerError::InvalidCredentials),
    }
}

/// Verify credentials and issue a session token.
pub async fn login(
    state: &AppState,
    email: &str,
    secret: String,
) -> Result<(String, DateTime<Utc>, Account), ServerError> {
    let account = verify_credentials(state, email, secret).await?;
    let (token, claims) = state.auth.issue_token(account.id, Utc::now())?;
    info!(account_id = %account.id, "Session issued");
    Ok((token, claims.expires_at(), account))
}

/// Resolve the account behind an authenticated request.
///
/// A valid token whose account has since been deleted is treated as
/// unauthenticated.
pub async fn current_account(state: &AppState, account_id: Uuid) -> Result<Account, ServerError> {
    state
        .with_db(move |db| db.get_account(account_id))
        .await
        .map_err(account_gone)
}

pub async fn update_profile(
    state: &AppState,
    account_id: Uuid,
    name: &str,
) -> Result<Account, ServerError> {
    let name = validate_name(name)?;
    let account = state
        .with_db(move |db| db.update_account_name(account_id, &name, Utc::now()))
        .await
        .map_err(account_gone)?;
    info!(account_id = %account.id, "Profile updated");
    Ok(account)
}

/// Delete an account after re-checking its secret.
///
/// The account row and its scans go in one transaction; the blobs are
/// removed afterwards and failures there are logged, not returned.
pub async fn delete_account(
    state: &AppState,
    account_id: Uuid,
    secret: String,
) -> Result<(), ServerError> {
    let credential = state
        .with_db(move |db| db.get_credential(account_id))
        .await
        .map_err(account_gone)?;

    let stored_hash = credential.password_hash;
    let valid = state
        .with_auth(move |auth| Ok(auth.verify_secret(Some(&stored_hash), &secret)))
        .await?;
    if !valid {
        return Err(ServerError::InvalidCredentials);
    }

    let blob_names = state
        .with_db(move |db| db.delete_account(account_id))
        .await
        .map_err(account_gone)?;

    let mut leaked = 0usize;
    for name in &blob_names {
        if let Err(e) = state.blob_store.delete(name).await {
            leaked += 1;
            warn!(
                account_id = %account_id,
                blob = %name,
                error = %e,
                "Failed to delete blob of deleted account"
            );
        }
    }

    info!(
        account_id = %account_id,
        scans = blob_names.len(),
        leaked,
        "Account deleted"
    );
    Ok(())
}

/// The token is valid but its account no longer exists.
fn account_gone(err: ServerError) -> ServerError {
    match err {
        ServerError::NotFound => ServerError::Unauthenticated,
        other => other,
    }
}
