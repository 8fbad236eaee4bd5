use std::sync::{Arc, Mutex};

use freshscan_store::{Database, StoreError};
use tracing::info;

use crate::analysis::{AnalysisProvider, SyntheticAnalyzer};
use crate::auth::Authenticator;
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::error::ServerError;

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub blob_store: Arc<BlobStore>,
    pub analyzer: Arc<dyn AnalysisProvider>,
    pub auth: Arc<Authenticator>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        db: Database,
        blob_store: BlobStore,
        analyzer: Arc<dyn AnalysisProvider>,
        auth: Authenticator,
        config: ServerConfig,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            blob_store: Arc::new(blob_store),
            analyzer,
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }

    /// Open the database and blob directory named by `config` and wire up
    /// the synthetic analyzer.
    pub async fn from_config(config: ServerConfig) -> Result<Self, ServerError> {
        let db_path = config.database_path.clone();
        let db = tokio::task::spawn_blocking(move || Database::open_at(&db_path))
            .await
            .map_err(|e| ServerError::Internal(format!("Database open task failed: {e}")))??;
        info!(path = %config.database_path.display(), "Database opened");

        let blob_store =
            BlobStore::new(config.blob_storage_path.clone(), config.max_upload_size).await?;
        let analyzer: Arc<dyn AnalysisProvider> = Arc::new(SyntheticAnalyzer::from_config(&config));
        let auth = Authenticator::from_config(&config)?;

        Ok(Self::new(db, blob_store, analyzer, auth, config))
    }

    /// Run `f` against the database on the blocking thread pool.
    pub async fn with_db<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|_| ServerError::Internal("Database lock poisoned".to_string()))?;
            f(&mut guard).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("Database task failed: {e}")))?
    }

    /// Run CPU-heavy work (secret hashing) off the async runtime.
    pub async fn with_auth<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Authenticator) -> Result<T, ServerError> + Send + 'static,
        T: Send + 'static,
    {
        let auth = Arc::clone(&self.auth);
        tokio::task::spawn_blocking(move || f(&auth))
            .await
            .map_err(|e| ServerError::Internal(format!("Blocking task failed: {e}")))?
    }
}
