//! On-disk storage for uploaded files.
//!
//! Blobs are addressed by generated names (`<uuid-v7>.<ext>`), never by the
//! client's file name. Writes go to a hidden temp file that is renamed into
//! place on commit, so readers never see a half-written blob.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use freshscan_shared::ContentType;

use crate::error::ServerError;

const TEMP_PREFIX: &str = ".tmp-";

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let mut resolved = base.to_path_buf();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::InvalidInput(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {} // RootDir, CurDir and Prefix are skipped
        }
    }
    if !resolved.starts_with(base) {
        return Err(ServerError::InvalidInput(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// Blob names are generated by us; anything else is rejected outright.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl BlobStore {
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::BlobStorage(format!(
                "Failed to create blob directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;
        let base_path = base_path.canonicalize().unwrap_or(base_path);

        info!(path = %base_path.display(), max_size, "Blob store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Start a streamed upload.
    ///
    /// The content type and the declared size (when the client sent one) are
    /// checked before anything touches the disk.
    pub async fn begin(
        &self,
        content_type: &str,
        declared_size: Option<u64>,
    ) -> Result<BlobWriter, ServerError> {
        let content_type = ContentType::from_mime(content_type)
            .ok_or_else(|| ServerError::UnsupportedType(content_type.to_string()))?;

        if declared_size.is_some_and(|size| size > self.max_size) {
            return Err(ServerError::PayloadTooLarge { max: self.max_size });
        }

        let name = format!("{}.{}", Uuid::now_v7().simple(), content_type.extension());
        let final_path = self.blob_path(&name)?;
        let temp_path = self.base_path.join(format!("{TEMP_PREFIX}{name}"));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
            .map_err(|e| ServerError::BlobStorage(format!("Failed to create blob {name}: {e}")))?;

        Ok(BlobWriter {
            file,
            name,
            content_type,
            temp_path,
            final_path,
            written: 0,
            max_size: self.max_size,
            committed: false,
        })
    }

    /// Store a complete buffer in one go.
    pub async fn accept(
        &self,
        data: &[u8],
        content_type: &str,
        declared_size: Option<u64>,
    ) -> Result<String, ServerError> {
        let mut writer = self.begin(content_type, declared_size).await?;
        writer.write_chunk(data).await?;
        writer.commit().await
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.blob_path(name)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServerError::NotFound);
            }
            Err(e) => {
                return Err(ServerError::BlobStorage(format!(
                    "Failed to read blob {name}: {e}"
                )))
            }
        };

        debug!(name, size = data.len(), "Retrieved blob");
        Ok(data)
    }

    /// Remove a blob. Removing a blob that does not exist succeeds, so
    /// cleanup can be retried safely.
    pub async fn delete(&self, name: &str) -> Result<(), ServerError> {
        let path = self.blob_path(name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(name, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServerError::BlobStorage(format!(
                "Failed to delete blob {name}: {e}"
            ))),
        }
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.blob_path(name) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, ServerError> {
        if !is_valid_name(name) {
            return Err(ServerError::InvalidInput("Invalid blob name".to_string()));
        }
        ensure_within(&self.base_path, &self.base_path.join(name))
    }
}

/// An in-progress upload. Dropping it without [`BlobWriter::commit`] removes
/// the temp file.
#[derive(Debug)]
pub struct BlobWriter {
    file: fs::File,
    name: String,
    content_type: ContentType,
    temp_path: PathBuf,
    final_path: PathBuf,
    written: u64,
    max_size: u64,
    committed: bool,
}

impl BlobWriter {
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk, failing as soon as the running total passes the cap.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ServerError> {
        let len = chunk.len() as u64;
        if self.written.saturating_add(len) > self.max_size {
            return Err(ServerError::PayloadTooLarge { max: self.max_size });
        }

        self.file.write_all(chunk).await.map_err(|e| {
            ServerError::BlobStorage(format!("Failed to write blob {}: {e}", self.name))
        })?;
        self.written += len;
        Ok(())
    }

    /// Flush, fsync and move the blob under its final name.
    pub async fn commit(mut self) -> Result<String, ServerError> {
        if self.written == 0 {
            return Err(ServerError::InvalidInput("Uploaded file is empty".to_string()));
        }

        let name = self.name.clone();
        let io_err = |e: std::io::Error| {
            ServerError::BlobStorage(format!("Failed to commit blob {name}: {e}"))
        };

        self.file.flush().await.map_err(io_err)?;
        self.file.sync_all().await.map_err(io_err)?;
        fs::rename(&self.temp_path, &self.final_path)
            .await
            .map_err(io_err)?;
        self.committed = true;

        debug!(name = %self.name, size = self.written, "Stored blob");
        Ok(self.name.clone())
    }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.temp_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.temp_path.display(), error = %e, "Failed to remove partial blob");
                }
            }
        }
    }
}
