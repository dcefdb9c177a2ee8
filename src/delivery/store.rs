//! Object store backends.
//!
//! The pipeline only needs `put(key, bytes)`. [`HttpObjectStore`] PUTs to an
//! S3-style `{endpoint}/{bucket}/{key}` URL; [`DirectoryStore`] writes the
//! same layout under a local directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Object store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Configuration error
    #[error("Store config error: {0}")]
    Config(String),
    /// Network/HTTP error
    #[error("Store network error: {0}")]
    Network(String),
    /// Server returned an error response
    #[error("Store server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// Local filesystem error
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for artifacts.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StoreError>;

    /// Short human-readable description for logs and status output.
    fn describe(&self) -> String;
}

/// Connection settings for the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL, e.g. `https://storage.example.com`
    pub endpoint: String,
    /// Bucket all keys are placed in
    pub bucket: String,
    /// Optional static bearer token passed through as-is
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// When set, artifacts are written here instead of uploaded
    pub directory: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            bucket: "activity-agent".to_string(),
            token: None,
            timeout_secs: 30,
            directory: None,
        }
    }
}

impl StoreConfig {
    /// URL an object with `key` is PUT to.
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            key.trim_start_matches('/')
        )
    }

    /// Build the backend this configuration selects.
    pub fn build(&self) -> Result<Box<dyn ObjectStore>, StoreError> {
        match self.directory {
            Some(ref dir) => Ok(Box::new(DirectoryStore::new(dir.clone(), &self.bucket))),
            None => Ok(Box::new(HttpObjectStore::new(self.clone())?)),
        }
    }
}

/// HTTP PUT object store driven by a private single-thread runtime.
///
/// Safe to call from plain threads; must not be called from inside
/// another tokio runtime.
pub struct HttpObjectStore {
    config: StoreConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    device_id: String,
}

impl HttpObjectStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        if config.endpoint.trim().is_empty() {
            return Err(StoreError::Config("Store endpoint is empty".to_string()));
        }
        if config.bucket.trim().is_empty() {
            return Err(StoreError::Config("Store bucket is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {e}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create runtime: {e}")))?;

        // Device ID from hostname + instance
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let device_id = format!(
            "agent-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Ok(Self {
            config,
            client,
            runtime,
            device_id,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn put_async(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StoreError> {
        let mut request = self
            .client
            .put(self.config.object_url(key))
            .header("Content-Type", content_type)
            .header("X-Device-Id", &self.device_id)
            .body(body.to_vec());

        if let Some(ref token) = self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

impl ObjectStore for HttpObjectStore {
    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StoreError> {
        self.runtime.block_on(self.put_async(key, body, content_type))
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), self.config.bucket)
    }
}

/// Writes objects to `{root}/{bucket}/{key}` on the local filesystem.
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, bucket: &str) -> Self {
        Self {
            root: root.into().join(bucket),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if key.is_empty() || escapes {
            return Err(StoreError::Config(format!("Invalid object key '{key}'")));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for DirectoryStore {
    fn put(&self, key: &str, body: &[u8], _content_type: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write then rename so readers never see a partial object
        let tmp = path.with_extension("partial");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
