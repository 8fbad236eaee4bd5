//! Domain model structs persisted in the SQLite database.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use freshscan_shared::api::{AccountView, AnalysisMetadataView};
use freshscan_shared::{ContentType, Freshness, NutritionClass};

use crate::error::{Result, StoreError};

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A registered account. Deliberately carries no secret material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    /// Normalized (trimmed, lower-cased) email address.
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn to_view(&self) -> AccountView {
        AccountView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// An account together with its password hash. Only returned by the
/// credential lookups used for verification.
#[derive(Debug, Clone)]
pub struct Credential {
    pub account: Account,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Metadata about the uploaded file a scan was computed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMeta {
    /// Name the client uploaded the file under. Display only.
    pub file_name: String,
    pub content_type: ContentType,
    pub file_size: u64,
}

/// Result of one analysis, as produced by an analysis provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisOutcome {
    /// 0..=100
    pub quality_score: u8,
    pub freshness: Freshness,
    pub nutrition: NutritionClass,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
    pub processing_time_ms: u64,
    pub model_version: String,
    /// 0.0..=1.0
    pub confidence: f64,
}

impl AnalysisOutcome {
    /// Check the range invariants of the outcome.
    pub fn validate(&self) -> Result<()> {
        if self.quality_score > 100 {
            return Err(StoreError::InvalidRecord(format!(
                "quality score {} outside 0..=100",
                self.quality_score
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(StoreError::InvalidRecord(format!(
                "confidence {} outside 0..=1",
                self.confidence
            )));
        }
        Ok(())
    }

    pub fn metadata_view(&self) -> AnalysisMetadataView {
        AnalysisMetadataView {
            processing_time_ms: self.processing_time_ms,
            model_version: self.model_version.clone(),
            confidence: self.confidence,
        }
    }
}

/// A persisted scan record. Append-only: there is no update path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file: FileMeta,
    /// Name of the blob holding the uploaded bytes. Internal; never sent to
    /// clients.
    pub blob_name: String,
    pub analyzed_at: DateTime<Utc>,
    pub analysis: AnalysisOutcome,
}

// ---------------------------------------------------------------------------
// Timestamp encoding
// ---------------------------------------------------------------------------

/// Drop precision SQLite will not store, so in-memory values equal what a
/// later read returns.
pub(crate) fn ts_truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Fixed-width RFC-3339 so that lexical order in SQLite is time order.
pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn ts_from_sql(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Wrap a conversion error for column `idx` the way rusqlite expects.
pub(crate) fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn outcome() -> AnalysisOutcome {
        AnalysisOutcome {
            quality_score: 80,
            freshness: Freshness::Good,
            nutrition: NutritionClass::High,
            recommendations: vec!["Eat within 2 days".into()],
            warnings: vec![],
            processing_time_ms: 12,
            model_version: "test".into(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_outcome_validate_ranges() {
        assert!(outcome().validate().is_ok());

        let mut bad = outcome();
        bad.quality_score = 101;
        assert!(bad.validate().is_err());

        let mut bad = outcome();
        bad.confidence = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = outcome();
        bad.confidence = f64::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_timestamp_encoding_sorts_lexically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert!(ts_to_sql(&a) < ts_to_sql(&b));
        assert_eq!(ts_from_sql(&ts_to_sql(&a)).unwrap(), a);
    }
}
