//! Fixtures shared by the unit tests of this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as TokenTtl;
use tempfile::TempDir;

use freshscan_shared::session::generate_signing_key;
use freshscan_shared::ContentType;
use freshscan_store::{AnalysisOutcome, Database};

use crate::analysis::{AnalysisError, AnalysisProvider, SyntheticAnalyzer};
use crate::auth::Authenticator;
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::state::AppState;

/// Always fails, to exercise the cleanup paths.
pub struct FailingAnalyzer;

#[async_trait]
impl AnalysisProvider for FailingAnalyzer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn analyze(
        &self,
        _bytes: &[u8],
        _content_type: ContentType,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        Err(AnalysisError::Provider("model unavailable".into()))
    }
}

pub async fn test_state() -> (AppState, TempDir) {
    test_state_with(Arc::new(SyntheticAnalyzer::new(Some(7), Duration::ZERO))).await
}

pub async fn test_state_with(analyzer: Arc<dyn AnalysisProvider>) -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = ServerConfig {
        database_path: dir.path().join("test.db"),
        blob_storage_path: dir.path().join("blobs"),
        analysis_delay: Duration::ZERO,
        analysis_timeout: Duration::from_secs(5),
        argon2_memory_kib: 8,
        argon2_iterations: 1,
        ..ServerConfig::default()
    };

    let db = Database::open_at(&config.database_path).unwrap();
    let blob_store = BlobStore::new(config.blob_storage_path.clone(), config.max_upload_size)
        .await
        .unwrap();
    let auth = Authenticator::new(generate_signing_key(), TokenTtl::hours(1), 8, 1).unwrap();

    (AppState::new(db, blob_store, analyzer, auth, config), dir)
}
