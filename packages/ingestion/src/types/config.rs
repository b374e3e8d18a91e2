//! Explicit configuration values.
//!
//! Every component receives its configuration at construction; there is
//! no process-wide settings singleton. Defaults match the reference
//! deployment and every external call carries a deadline.

use std::time::Duration;

use crate::credentials::SecretString;
use crate::types::vector::{CollectionSpec, DistanceMetric};

/// Directory prefixes and file suffixes excluded from repository walks.
pub const DEFAULT_IGNORE: &[&str] = &[
    ".git", ".toml", ".lock", ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".svg", ".dll",
    ".exe", ".zip", ".tar", ".gz", ".pdf", ".docx", ".xlsx",
];

/// Configuration for repository extraction.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Ignore set: directory-prefix and file-suffix patterns
    pub ignore: Vec<String>,

    /// Per-file size cap in bytes (checked on metadata, then on decoded
    /// length; the two can diverge for multi-byte encodings)
    pub max_file_bytes: u64,

    /// Soft cap on total accumulated content bytes
    pub max_total_bytes: u64,

    /// Deadline for the clone subprocess
    pub clone_timeout: Duration,

    /// Platform tag stamped on produced documents
    pub platform: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            ignore: DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect(),
            max_file_bytes: 512 * 1024,
            max_total_bytes: 5 * 1024 * 1024,
            clone_timeout: Duration::from_secs(120),
            platform: "github".to_string(),
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ignore set.
    pub fn with_ignore(mut self, ignore: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore = ignore.into_iter().map(|p| p.into()).collect();
        self
    }

    /// Set the per-file size cap.
    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    /// Set the total content cap.
    pub fn with_max_total_bytes(mut self, bytes: u64) -> Self {
        self.max_total_bytes = bytes;
        self
    }

    /// Set the clone deadline.
    pub fn with_clone_timeout(mut self, timeout: Duration) -> Self {
        self.clone_timeout = timeout;
        self
    }

    /// Set the platform tag.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }
}

/// Configuration for browser-session capabilities.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// WebDriver endpoint the engine speaks to
    pub webdriver_url: String,

    /// Maximum bottom-scrolls while waiting for a page to stabilize
    pub scroll_limit: usize,

    /// Render-settling delay between scrolls
    pub settle: Duration,

    /// Deadline for each navigation/script round-trip
    pub script_timeout: Duration,

    /// Run the browser headless
    pub headless: bool,

    /// Optional login script; `BrowserSession::login` is a no-op without it
    pub login_script: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            scroll_limit: 5,
            settle: Duration::from_secs(5),
            script_timeout: Duration::from_secs(30),
            headless: true,
            login_script: None,
        }
    }
}

impl BrowserConfig {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            ..Default::default()
        }
    }

    /// Set the scroll limit.
    pub fn with_scroll_limit(mut self, limit: usize) -> Self {
        self.scroll_limit = limit;
        self
    }

    /// Set the settling delay.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the per-call deadline.
    pub fn with_script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = timeout;
        self
    }

    /// Run with a visible browser window.
    pub fn headed(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Set a login script to run before navigation.
    pub fn with_login_script(mut self, script: impl Into<String>) -> Self {
        self.login_script = Some(script.into());
        self
    }
}

/// Configuration for the vector store adapter.
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Store endpoint
    pub url: String,

    /// Optional API key sent as the `api-key` header
    pub api_key: Option<SecretString>,

    /// Metric used when a collection is auto-provisioned
    pub metric: DistanceMetric,

    /// Records per bulk write, sized to the store's payload limits
    pub chunk_size: usize,

    /// Deadline for each store round-trip
    pub request_timeout: Duration,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            metric: DistanceMetric::Cosine,
            chunk_size: 64,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl VectorStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<SecretString>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the provisioning metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the bulk-write chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Embedding model identity, consumed read-only by this core.
///
/// Inference happens elsewhere; the dimension only matters for collection
/// provisioning.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub model_id: String,
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: 384,
        }
    }
}

impl EmbeddingSettings {
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
        }
    }

    /// Spec for a collection holding this model's embeddings.
    pub fn collection_spec(&self, name: impl Into<String>, metric: DistanceMetric) -> CollectionSpec {
        CollectionSpec::new(name, self.dimension, metric)
    }
}
