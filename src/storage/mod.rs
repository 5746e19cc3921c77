mod naming;

pub use naming::*;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("storage responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of base PDFs, addressed by template id (e.g. `001.pdf`).
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn fetch(&self, template_id: &str) -> Result<Vec<u8>, StorageError>;
}

/// Durable home of issued certificates.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Stores `bytes` under `file_name` and returns the retrieval URL.
    async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String, StorageError>;
}

/// Object storage reached over HTTP with a bearer key. Serves both templates and
/// issued certificates.
pub struct HttpStorage {
    client: Client,
    config: Config,
}

impl HttpStorage {
    pub fn new(config: &Config) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl TemplateStore for HttpStorage {
    async fn fetch(&self, template_id: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.config.template_url(template_id);
        debug!("Fetching template {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.storage_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(template_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Publisher for HttpStorage {
    async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let url = self.config.issued_url(file_name);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.storage_key)
            .header("content-type", "application/pdf")
            .header("x-upsert", "true")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("Published {} ({} bytes)", file_name, bytes.len());
        Ok(url)
    }
}

/// Templates read from a local directory instead of remote storage.
pub struct DirTemplateStore {
    root: PathBuf,
}

impl DirTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TemplateStore for DirTemplateStore {
    async fn fetch(&self, template_id: &str) -> Result<Vec<u8>, StorageError> {
        if template_id.contains("..") || template_id.contains('/') || template_id.contains('\\') {
            return Err(StorageError::NotFound(template_id.to_string()));
        }
        let path = self.root.join(template_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
