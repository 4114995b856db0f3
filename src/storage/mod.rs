//! Object storage for uploaded and generated reports.
//!
//! Every store returns `Ok(url)` or a [`StorageError`]; nothing here panics or
//! swallows failures. The pipeline decides how a failed upload degrades.

pub mod s3;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store credentials unavailable: {0}")]
    Credentials(String),

    #[error("failed to read local file {path}: {reason}")]
    LocalFile { path: PathBuf, reason: String },

    #[error("upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("failed to presign {key}: {reason}")]
    Presign { key: String, reason: String },
}

impl StorageError {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::Credentials(_) => "credentials",
            StorageError::LocalFile { .. } => "local_file",
            StorageError::Upload { .. } => "upload",
            StorageError::Presign { .. } => "presign",
        }
    }
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads `local_path` under `key` and returns a URL the caller can fetch it from.
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError>;
}
