//! Scan records: create, ownership-scoped lookups, filtered pagination and
//! deletion.
//!
//! Every query takes the owner id and puts it in the WHERE clause, so a scan
//! owned by someone else is indistinguishable from a missing one.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use uuid::Uuid;

use freshscan_shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use freshscan_shared::{ContentType, Freshness, NutritionClass, ParseKindError};

use crate::database::Database;
use crate::error::{constraint_code, not_found, Result, StoreError};
use crate::models::{
    conversion_err, ts_from_sql, ts_to_sql, ts_truncate, AnalysisOutcome, FileMeta, ScanRecord,
};

const SCAN_COLUMNS: &str = "id, owner_id, file_name, content_type, blob_name, file_size, \
     analyzed_at, quality_score, freshness, nutrition, recommendations, warnings, \
     processing_time_ms, model_version, confidence";

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Optional history filters. Set fields combine with AND; `min_score` and
/// `max_score` together form one inclusive range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanFilter {
    pub freshness: Option<Freshness>,
    pub min_score: Option<u8>,
    pub max_score: Option<u8>,
}

/// A parameterized WHERE clause (without the `WHERE` keyword).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlWhere {
    pub clause: String,
    pub params: Vec<Value>,
}

impl ScanFilter {
    /// Reject bounds outside 0..=100 and inverted ranges.
    pub fn validate(&self) -> Result<()> {
        for bound in [self.min_score, self.max_score].into_iter().flatten() {
            if bound > 100 {
                return Err(StoreError::InvalidQuery(format!(
                    "score bound {bound} outside 0..=100"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_score, self.max_score) {
            if min > max {
                return Err(StoreError::InvalidQuery(format!(
                    "minScore {min} is greater than maxScore {max}"
                )));
            }
        }
        Ok(())
    }

    /// Translate the filter into SQL scoped to `owner_id`.
    ///
    /// Values are always bound as parameters, never spliced into the text.
    pub fn to_sql(&self, owner_id: Uuid) -> SqlWhere {
        let mut clauses = vec!["owner_id = ?"];
        let mut params = vec![Value::Text(owner_id.to_string())];

        if let Some(freshness) = self.freshness {
            clauses.push("freshness = ?");
            params.push(Value::Text(freshness.as_str().to_string()));
        }
        if let Some(min) = self.min_score {
            clauses.push("quality_score >= ?");
            params.push(Value::Integer(i64::from(min)));
        }
        if let Some(max) = self.max_score {
            clauses.push("quality_score <= ?");
            params.push(Value::Integer(i64::from(max)));
        }

        SqlWhere {
            clause: clauses.join(" AND "),
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// A validated, 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        if page == 0 {
            return Err(StoreError::InvalidQuery("page must be at least 1".into()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(StoreError::InvalidQuery(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of scans plus the total number of matching scans.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub records: Vec<ScanRecord>,
    pub total: u64,
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

impl Database {
    /// Persist a completed analysis as a new scan. One INSERT, so a partial
    /// record is never visible.
    pub fn insert_scan(
        &self,
        owner_id: Uuid,
        file: FileMeta,
        analysis: AnalysisOutcome,
        blob_name: &str,
        analyzed_at: DateTime<Utc>,
    ) -> Result<ScanRecord> {
        analysis.validate()?;

        let record = ScanRecord {
            id: Uuid::now_v7(),
            owner_id,
            file,
            blob_name: blob_name.to_string(),
            analyzed_at: ts_truncate(analyzed_at),
            analysis,
        };

        let file_size = i64::try_from(record.file.file_size)
            .map_err(|_| StoreError::InvalidRecord("file size out of range".into()))?;
        let processing_ms = i64::try_from(record.analysis.processing_time_ms)
            .map_err(|_| StoreError::InvalidRecord("processing time out of range".into()))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO scans ({SCAN_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    record.id.to_string(),
                    record.owner_id.to_string(),
                    record.file.file_name,
                    record.file.content_type.as_mime(),
                    record.blob_name,
                    file_size,
                    ts_to_sql(&record.analyzed_at),
                    record.analysis.quality_score,
                    record.analysis.freshness.as_str(),
                    record.analysis.nutrition.as_str(),
                    serde_json::to_string(&record.analysis.recommendations)?,
                    serde_json::to_string(&record.analysis.warnings)?,
                    processing_ms,
                    record.analysis.model_version,
                    record.analysis.confidence,
                ],
            )
            .map_err(|e| match constraint_code(&e) {
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => StoreError::OwnerMissing,
                _ => StoreError::Sqlite(e),
            })?;

        Ok(record)
    }

    /// Fetch a scan owned by `owner_id`.
    pub fn get_scan(&self, owner_id: Uuid, id: Uuid) -> Result<ScanRecord> {
        self.conn()
            .query_row(
                &format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = ?1 AND owner_id = ?2"),
                params![id.to_string(), owner_id.to_string()],
                row_to_scan,
            )
            .map_err(not_found)
    }

    /// List scans of `owner_id` matching `filter`, newest first.
    ///
    /// Ties on `analyzed_at` are broken by id so that pages never overlap.
    pub fn list_scans(
        &self,
        owner_id: Uuid,
        filter: &ScanFilter,
        page: PageRequest,
    ) -> Result<ScanPage> {
        filter.validate()?;
        let SqlWhere { clause, params } = filter.to_sql(owner_id);

        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM scans WHERE {clause}"),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        let mut page_params = params;
        page_params.push(Value::Integer(i64::from(page.page_size())));
        page_params.push(Value::Integer(page.offset()));

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SCAN_COLUMNS} FROM scans
             WHERE {clause}
             ORDER BY analyzed_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(page_params.iter()), row_to_scan)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(ScanPage {
            records,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    /// Delete a scan owned by `owner_id` and return its blob name so the
    /// caller can remove the file.
    pub fn delete_scan(&self, owner_id: Uuid, id: Uuid) -> Result<String> {
        self.conn()
            .query_row(
                "DELETE FROM scans WHERE id = ?1 AND owner_id = ?2 RETURNING blob_name",
                params![id.to_string(), owner_id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .map_err(not_found)
    }
}

fn parse_kind<T>(idx: usize, s: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = ParseKindError>,
{
    s.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn row_to_scan(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanRecord> {
    let id_str: String = row.get(0)?;
    let owner_str: String = row.get(1)?;
    let file_name: String = row.get(2)?;
    let content_type_str: String = row.get(3)?;
    let blob_name: String = row.get(4)?;
    let file_size: i64 = row.get(5)?;
    let analyzed_str: String = row.get(6)?;
    let quality_score: u8 = row.get(7)?;
    let freshness_str: String = row.get(8)?;
    let nutrition_str: String = row.get(9)?;
    let recommendations_json: String = row.get(10)?;
    let warnings_json: String = row.get(11)?;
    let processing_time_ms: i64 = row.get(12)?;
    let model_version: String = row.get(13)?;
    let confidence: f64 = row.get(14)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_err(0, e))?;
    let owner_id = Uuid::parse_str(&owner_str).map_err(|e| conversion_err(1, e))?;
    let content_type: ContentType = parse_kind(3, &content_type_str)?;
    let analyzed_at = ts_from_sql(&analyzed_str).map_err(|e| conversion_err(6, e))?;
    let freshness: Freshness = parse_kind(8, &freshness_str)?;
    let nutrition: NutritionClass = parse_kind(9, &nutrition_str)?;
    let recommendations: Vec<String> =
        serde_json::from_str(&recommendations_json).map_err(|e| conversion_err(10, e))?;
    let warnings: Vec<String> =
        serde_json::from_str(&warnings_json).map_err(|e| conversion_err(11, e))?;

    Ok(ScanRecord {
        id,
        owner_id,
        file: FileMeta {
            file_name,
            content_type,
            file_size: u64::try_from(file_size).unwrap_or(0),
        },
        blob_name,
        analyzed_at,
        analysis: AnalysisOutcome {
            quality_score,
            freshness,
            nutrition,
            recommendations,
            warnings,
            processing_time_ms: u64::try_from(processing_time_ms).unwrap_or(0),
            model_version,
            confidence,
        },
    })
}
