use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{PathRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use freshscan_shared::api::{
    AccountResponse, DeleteAccountRequest, HistoryQuery, HistoryResponse, LoginRequest,
    LoginResponse, RegisterRequest, ScanResponse, StatsResponse, UpdateProfileRequest,
};
use freshscan_store::FileMeta;

use crate::accounts;
use crate::auth::{ApiJson, AuthUser};
use crate::error::ServerError;
use crate::scans::{self, scan_view};
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_SLACK: u64 = 1024 * 1024;

const MAX_FILE_NAME_LEN: usize = 255;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let body_limit = usize::try_from(state.config.max_upload_size + MULTIPART_SLACK)
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", get(verify))
        .route("/scan/analyze", post(analyze_scan))
        .route("/scan/history", get(scan_history))
        .route("/scan/{id}", get(get_scan).delete(delete_scan))
        .route("/scan/{id}/image", get(scan_image))
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/user/stats", get(user_stats))
        .route("/user/account", axum::routing::delete(delete_account))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn not_found() -> ServerError {
    ServerError::NotFound
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let account = accounts::register(&state, &req.name, &req.email, req.secret).await?;
    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            account: account.to_view(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let (token, expires_at, account) = accounts::login(&state, &req.email, req.secret).await?;
    Ok(Json(LoginResponse {
        token,
        expires_at,
        account: account.to_view(),
    }))
}

async fn verify(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AccountResponse>, ServerError> {
    let account = accounts::current_account(&state, user.account_id).await?;
    Ok(Json(AccountResponse {
        account: account.to_view(),
    }))
}

// ---------------------------------------------------------------------------
// Scans
// ---------------------------------------------------------------------------

/// Accept one multipart `file` field, stream it into the blob store, then
/// analyze it and record the result.
async fn analyze_scan(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ScanResponse>, ServerError> {
    let max = state.blob_store.max_size();
    let mut multipart = multipart.map_err(|e| ServerError::InvalidInput(e.body_text()))?;

    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if content_length.is_some_and(|len| len > max + MULTIPART_SLACK) {
        return Err(ServerError::PayloadTooLarge { max });
    }

    let multipart_err = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge { max }
        } else {
            ServerError::InvalidInput(format!("Multipart error: {}", e.body_text()))
        }
    };

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_err)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = sanitize_file_name(field.file_name());
        let declared_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut writer = state.blob_store.begin(&declared_type, None).await?;
        while let Some(chunk) = field.chunk().await.map_err(multipart_err)? {
            writer.write_chunk(&chunk).await?;
        }

        let file = FileMeta {
            file_name,
            content_type: writer.content_type(),
            file_size: writer.written(),
        };
        let blob_name = writer.commit().await?;
        debug!(blob = %blob_name, size = file.file_size, "Upload stored");

        let record = scans::record_analysis(&state, user.account_id, file, blob_name).await?;
        return Ok(Json(ScanResponse {
            scan: scan_view(&record),
        }));
    }

    Err(ServerError::InvalidInput(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn scan_history(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let Query(query) = query.map_err(|e| ServerError::InvalidInput(e.body_text()))?;
    let history = scans::list_history(&state, user.account_id, &query).await?;
    Ok(Json(history))
}

async fn get_scan(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ScanResponse>, ServerError> {
    let id = scan_id(id)?;
    let record = scans::get_scan(&state, user.account_id, id).await?;
    Ok(Json(ScanResponse {
        scan: scan_view(&record),
    }))
}

async fn scan_image(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let id = scan_id(id)?;
    let (content_type, bytes) = scans::scan_image(&state, user.account_id, id).await?;
    Ok(([(header::CONTENT_TYPE, content_type.as_mime())], bytes))
}

async fn delete_scan(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeletedResponse>, ServerError> {
    let id = scan_id(id)?;
    scans::delete_scan(&state, user.account_id, id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

/// A malformed id cannot name an existing scan.
fn scan_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ServerError> {
    id.map(|Path(id)| id).map_err(|_| ServerError::NotFound)
}

/// Keep only the final path component of a client-supplied file name and
/// drop control characters.
fn sanitize_file_name(raw: Option<&str>) -> String {
    let base = raw
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILE_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AccountResponse>, ServerError> {
    let account = accounts::current_account(&state, user.account_id).await?;
    Ok(Json(AccountResponse {
        account: account.to_view(),
    }))
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, ServerError> {
    let account = accounts::update_profile(&state, user.account_id, &req.name).await?;
    Ok(Json(AccountResponse {
        account: account.to_view(),
    }))
}

async fn user_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<StatsResponse>, ServerError> {
    let stats = scans::stats(&state, user.account_id).await?;
    Ok(Json(StatsResponse { stats }))
}

async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<DeleteAccountRequest>,
) -> Result<Json<DeletedResponse>, ServerError> {
    accounts::delete_account(&state, user.account_id, req.secret).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

/// Serve the API on `addr` until the future is dropped.
pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(state, listener).await
}

/// Serve the API on an already bound listener.
pub async fn serve_on(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %listener.local_addr()?, "Starting HTTP API server");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name(Some("apple.jpg")), "apple.jpg");
        assert_eq!(sanitize_file_name(Some("../../etc/passwd")), "passwd");
        assert_eq!(sanitize_file_name(Some("C:\\photos\\pear.png")), "pear.png");
        assert_eq!(sanitize_file_name(Some("bad\u{0}name.pdf")), "badname.pdf");
        assert_eq!(sanitize_file_name(Some("dir/")), "upload");
        assert_eq!(sanitize_file_name(Some("..")), "upload");
        assert_eq!(sanitize_file_name(None), "upload");
        assert_eq!(
            sanitize_file_name(Some(&"x".repeat(400))).len(),
            MAX_FILE_NAME_LEN
        );
    }
}
