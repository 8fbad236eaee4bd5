//! Scan operations: run an analysis over a stored upload, list and fetch
//! records, delete them, and compute stats.
//!
//! Cross-store ordering: on create the blob exists before the record, on
//! delete the record goes before the blob.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use freshscan_shared::api::{HistoryQuery, HistoryResponse, Pagination, ScanStatsView, ScanView};
use freshscan_shared::constants::DEFAULT_PAGE_SIZE;
use freshscan_shared::{ContentType, Freshness};
use freshscan_store::{FileMeta, PageRequest, ScanFilter, ScanRecord};

use crate::error::ServerError;
use crate::state::AppState;

/// Path under which the owner can fetch the uploaded image of a scan.
pub fn image_path(scan_id: Uuid) -> String {
    format!("/scan/{scan_id}/image")
}

/// Client-facing view of a record. The blob name stays internal.
pub fn scan_view(record: &ScanRecord) -> ScanView {
    ScanView {
        id: record.id,
        file_name: record.file.file_name.clone(),
        content_type: record.file.content_type,
        file_size: record.file.file_size,
        image_path: image_path(record.id),
        analyzed_at: record.analyzed_at,
        quality_score: record.analysis.quality_score,
        freshness: record.analysis.freshness,
        nutrition: record.analysis.nutrition,
        recommendations: record.analysis.recommendations.clone(),
        warnings: record.analysis.warnings.clone(),
        metadata: record.analysis.metadata_view(),
    }
}

/// Analyze an already stored blob and persist the result.
///
/// On any failure the blob is removed so nothing is left behind.
pub async fn record_analysis(
    state: &AppState,
    owner_id: Uuid,
    file: FileMeta,
    blob_name: String,
) -> Result<ScanRecord, ServerError> {
    match analyze_and_insert(state, owner_id, file, blob_name.clone()).await {
        Ok(record) => {
            info!(
                scan_id = %record.id,
                owner_id = %owner_id,
                score = record.analysis.quality_score,
                freshness = %record.analysis.freshness,
                "Scan recorded"
            );
            Ok(record)
        }
        Err(e) => {
            if let Err(cleanup) = state.blob_store.delete(&blob_name).await {
                warn!(
                    blob = %blob_name,
                    error = %cleanup,
                    "Failed to clean up blob after failed scan"
                );
            }
            Err(e)
        }
    }
}

async fn analyze_and_insert(
    state: &AppState,
    owner_id: Uuid,
    file: FileMeta,
    blob_name: String,
) -> Result<ScanRecord, ServerError> {
    let bytes = state.blob_store.read(&blob_name).await?;
    let timeout = state.config.analysis_timeout;

    let outcome = match tokio::time::timeout(
        timeout,
        state.analyzer.analyze(&bytes, file.content_type),
    )
    .await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            return Err(ServerError::AnalysisFailed(format!(
                "{} provider: {e}",
                state.analyzer.name()
            )));
        }
        Err(_) => {
            return Err(ServerError::AnalysisFailed(format!(
                "{} provider timed out after {timeout:?}",
                state.analyzer.name()
            )));
        }
    };

    outcome.validate().map_err(|e| {
        ServerError::AnalysisFailed(format!(
            "{} provider returned an invalid outcome: {e}",
            state.analyzer.name()
        ))
    })?;

    state
        .with_db(move |db| db.insert_scan(owner_id, file, outcome, &blob_name, Utc::now()))
        .await
}

pub async fn get_scan(
    state: &AppState,
    owner_id: Uuid,
    scan_id: Uuid,
) -> Result<ScanRecord, ServerError> {
    state
        .with_db(move |db| db.get_scan(owner_id, scan_id))
        .await
}

/// Turn history query parameters into a typed filter and page.
pub fn parse_history_query(query: &HistoryQuery) -> Result<(ScanFilter, PageRequest), ServerError> {
    let freshness = query
        .freshness
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Freshness>())
        .transpose()
        .map_err(|e| ServerError::InvalidInput(e.to_string()))?;

    let filter = ScanFilter {
        freshness,
        min_score: query.min_score,
        max_score: query.max_score,
    };
    filter.validate()?;

    let page = PageRequest::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    )?;

    Ok((filter, page))
}

pub async fn list_history(
    state: &AppState,
    owner_id: Uuid,
    query: &HistoryQuery,
) -> Result<HistoryResponse, ServerError> {
    let (filter, page) = parse_history_query(query)?;
    let result = state
        .with_db(move |db| db.list_scans(owner_id, &filter, page))
        .await?;

    Ok(HistoryResponse {
        records: result.records.iter().map(scan_view).collect(),
        pagination: Pagination::new(page.page(), page.page_size(), result.total),
    })
}

/// Bytes and content type of a scan's uploaded file.
pub async fn scan_image(
    state: &AppState,
    owner_id: Uuid,
    scan_id: Uuid,
) -> Result<(ContentType, Vec<u8>), ServerError> {
    let record = get_scan(state, owner_id, scan_id).await?;
    let bytes = state.blob_store.read(&record.blob_name).await?;
    Ok((record.file.content_type, bytes))
}

/// Delete a record, then its blob. A blob that cannot be removed is logged
/// and the request still succeeds.
pub async fn delete_scan(
    state: &AppState,
    owner_id: Uuid,
    scan_id: Uuid,
) -> Result<(), ServerError> {
    let blob_name = state
        .with_db(move |db| db.delete_scan(owner_id, scan_id))
        .await?;

    if let Err(e) = state.blob_store.delete(&blob_name).await {
        warn!(
            scan_id = %scan_id,
            blob = %blob_name,
            error = %e,
            "Scan deleted but blob removal failed"
        );
    }

    info!(scan_id = %scan_id, owner_id = %owner_id, "Scan deleted");
    Ok(())
}

pub async fn stats(state: &AppState, owner_id: Uuid) -> Result<ScanStatsView, ServerError> {
    state
        .with_db(move |db| db.scan_stats(owner_id, Utc::now()))
        .await
}
