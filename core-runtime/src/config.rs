//! # Core Configuration Module
//!
//! Provides configuration management for the riff synchronization core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding every tunable the engine and the offset store need. Every
//! field has a default, and `build()` validates eagerly so a bad value fails at
//! startup instead of in the middle of playback.
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - talks to the shared offset service (desktop default: reqwest)
//!
//! Without an `HttpClient` the remote store is never probed and offsets are
//! kept in the local database only.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/home/me/.riffsync/riffdb.sqlite")
//!     .drift_threshold(Duration::from_millis(150))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::HttpClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default local database file name.
pub const DEFAULT_DATABASE_FILE: &str = "riffdb.sqlite";

/// Default shared offset service endpoint.
pub const DEFAULT_REMOTE_URL: &str = "http://www.openriff.com/db";

/// Number of leading bytes hashed to identify a media file (25 MiB).
pub const DEFAULT_HASH_SAMPLE_SIZE: usize = 25 * 1024 * 1024;

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DRIFT_THRESHOLD: Duration = Duration::from_millis(100);
pub const DEFAULT_CORRECTION_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Core configuration for the riff synchronization engine.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path of the local SQLite offset database
    pub database_path: PathBuf,
    /// Recreate the local database schema on open, discarding stored offsets
    pub overwrite_database: bool,
    /// Shared offset service endpoint; `None` disables the remote store
    pub remote_url: Option<String>,
    /// Skip the remote probe and always use the local database
    pub force_local_store: bool,
    /// Upper bound for each remote request, the startup probe included
    pub remote_timeout: Duration,
    /// Leading bytes hashed per media file
    pub hash_sample_size: usize,
    /// Drift tolerated before the secondary track is re-seeked
    pub drift_threshold: Duration,
    /// Period of the background drift correction tick
    pub correction_interval: Duration,
    /// Buffer size of the event bus
    pub event_buffer_size: usize,
    /// HTTP client used by the remote store (optional)
    pub http_client: Option<Arc<dyn HttpClient>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("overwrite_database", &self.overwrite_database)
            .field("remote_url", &self.remote_url)
            .field("force_local_store", &self.force_local_store)
            .field("remote_timeout", &self.remote_timeout)
            .field("hash_sample_size", &self.hash_sample_size)
            .field("drift_threshold", &self.drift_threshold)
            .field("correction_interval", &self.correction_interval)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &self.http_client.is_some())
            .finish()
    }
}

/// Settings consumed by offset store selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub overwrite_database: bool,
    pub remote_url: Option<String>,
    pub force_local: bool,
    pub remote_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            overwrite_database: false,
            remote_url: Some(DEFAULT_REMOTE_URL.to_string()),
            force_local: false,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

/// Settings consumed by the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTuning {
    pub hash_sample_size: usize,
    pub drift_threshold: Duration,
    pub correction_interval: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            hash_sample_size: DEFAULT_HASH_SAMPLE_SIZE,
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
            correction_interval: DEFAULT_CORRECTION_INTERVAL,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Sample size, timeout and tick interval are non-zero
    /// - Event buffer can hold at least one event
    /// - Remote URL, when set, uses an HTTP scheme
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.hash_sample_size == 0 {
            return Err(Error::Config(
                "Hash sample size must be greater than 0 bytes".to_string(),
            ));
        }

        if self.remote_timeout.is_zero() {
            return Err(Error::Config(
                "Remote timeout must be greater than zero".to_string(),
            ));
        }

        if self.correction_interval.is_zero() {
            return Err(Error::Config(
                "Correction interval must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &self.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "Remote URL must start with http:// or https://, got '{}'",
                    url
                )));
            }
        }

        Ok(())
    }

    /// Store selection settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            database_path: self.database_path.clone(),
            overwrite_database: self.overwrite_database,
            remote_url: self.remote_url.clone(),
            force_local: self.force_local_store,
            remote_timeout: self.remote_timeout,
        }
    }

    /// Engine tuning derived from this configuration.
    pub fn sync_tuning(&self) -> SyncTuning {
        SyncTuning {
            hash_sample_size: self.hash_sample_size,
            drift_threshold: self.drift_threshold,
            correction_interval: self.correction_interval,
        }
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Option<Arc<dyn HttpClient>>> {
    let client = bridge_desktop::ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HTTP client: {}", e)))?;
    Ok(Some(Arc::new(client)))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for constructing a `CoreConfig` with fail-fast validation.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    overwrite_database: bool,
    remote_url: Option<Option<String>>,
    force_local_store: bool,
    remote_timeout: Option<Duration>,
    hash_sample_size: Option<usize>,
    drift_threshold: Option<Duration>,
    correction_interval: Option<Duration>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl CoreConfigBuilder {
    /// Sets the local database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/riffdb.sqlite");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Recreate the local schema when the database is opened.
    pub fn overwrite_database(mut self, overwrite: bool) -> Self {
        self.overwrite_database = overwrite;
        self
    }

    /// Sets the shared offset service endpoint.
    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(Some(url.into()));
        self
    }

    /// Disables the shared offset service entirely.
    pub fn no_remote(mut self) -> Self {
        self.remote_url = Some(None);
        self
    }

    /// Always use the local database, even if the remote is reachable.
    pub fn force_local_store(mut self, force: bool) -> Self {
        self.force_local_store = force;
        self
    }

    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = Some(timeout);
        self
    }

    pub fn hash_sample_size(mut self, bytes: usize) -> Self {
        self.hash_sample_size = Some(bytes);
        self
    }

    pub fn drift_threshold(mut self, threshold: Duration) -> Self {
        self.drift_threshold = Some(threshold);
        self
    }

    pub fn correction_interval(mut self, interval: Duration) -> Self {
        self.correction_interval = Some(interval);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// With the `desktop-shims` feature a reqwest client is injected when none
    /// is provided.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    /// let config = CoreConfig::builder()
    ///     .database_path("/tmp/riffdb.sqlite")
    ///     .no_remote()
    ///     .build()?;
    /// # Ok::<(), core_runtime::Error>(())
    /// ```
    pub fn build(self) -> Result<CoreConfig> {
        let remote_timeout = self.remote_timeout.unwrap_or(DEFAULT_REMOTE_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client(remote_timeout)?,
        };

        let config = CoreConfig {
            database_path: self
                .database_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE)),
            overwrite_database: self.overwrite_database,
            remote_url: self
                .remote_url
                .unwrap_or_else(|| Some(DEFAULT_REMOTE_URL.to_string())),
            force_local_store: self.force_local_store,
            remote_timeout,
            hash_sample_size: self.hash_sample_size.unwrap_or(DEFAULT_HASH_SAMPLE_SIZE),
            drift_threshold: self.drift_threshold.unwrap_or(DEFAULT_DRIFT_THRESHOLD),
            correction_interval: self
                .correction_interval
                .unwrap_or(DEFAULT_CORRECTION_INTERVAL),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{HttpRequest, HttpResponse};

    struct StubHttpClient;

    #[async_trait]
    impl HttpClient for StubHttpClient {
        async fn execute(&self, _request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
            Err(bridge_traits::BridgeError::NotAvailable("stub".to_string()))
        }
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::builder().build().unwrap();

        assert_eq!(config.database_path, PathBuf::from("riffdb.sqlite"));
        assert!(!config.overwrite_database);
        assert_eq!(
            config.remote_url.as_deref(),
            Some("http://www.openriff.com/db")
        );
        assert!(!config.force_local_store);
        assert_eq!(config.remote_timeout, Duration::from_secs(5));
        assert_eq!(config.hash_sample_size, 25 * 1024 * 1024);
        assert_eq!(config.drift_threshold, Duration::from_millis(100));
        assert_eq!(config.correction_interval, Duration::from_secs(10));
        assert_eq!(config.event_buffer_size, 100);
    }

    #[test]
    fn test_builder_overrides() {
        let config = CoreConfig::builder()
            .database_path("/tmp/offsets.sqlite")
            .overwrite_database(true)
            .remote_url("https://riffs.example.org/db")
            .force_local_store(true)
            .remote_timeout(Duration::from_secs(2))
            .hash_sample_size(1024)
            .drift_threshold(Duration::from_millis(250))
            .correction_interval(Duration::from_secs(3))
            .event_buffer_size(16)
            .http_client(Arc::new(StubHttpClient))
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/offsets.sqlite"));
        assert!(config.overwrite_database);
        assert!(config.force_local_store);
        assert!(config.http_client.is_some());

        let store = config.store_config();
        assert_eq!(store.remote_url.as_deref(), Some("https://riffs.example.org/db"));
        assert!(store.force_local);
        assert!(store.overwrite_database);
        assert_eq!(store.remote_timeout, Duration::from_secs(2));

        let tuning = config.sync_tuning();
        assert_eq!(tuning.hash_sample_size, 1024);
        assert_eq!(tuning.drift_threshold, Duration::from_millis(250));
        assert_eq!(tuning.correction_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_no_remote() {
        let config = CoreConfig::builder().no_remote().build().unwrap();
        assert!(config.remote_url.is_none());
        assert!(config.store_config().remote_url.is_none());
    }

    #[test]
    fn test_rejects_empty_database_path() {
        let result = CoreConfig::builder().database_path("").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_sample_size() {
        let result = CoreConfig::builder().hash_sample_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_durations() {
        let result = CoreConfig::builder()
            .correction_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));

        let result = CoreConfig::builder().remote_timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_event_buffer() {
        let result = CoreConfig::builder().event_buffer_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_non_http_remote_url() {
        let result = CoreConfig::builder().remote_url("ftp://riffs.example.org").build();
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("ftp://riffs.example.org")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_drift_threshold_allowed() {
        let config = CoreConfig::builder()
            .drift_threshold(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(config.drift_threshold, Duration::ZERO);
    }

    #[test]
    fn test_debug_hides_client() {
        let config = CoreConfig::builder()
            .http_client(Arc::new(StubHttpClient))
            .build()
            .unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("http_client: true"));
    }

    #[test]
    fn test_component_defaults_match_builder() {
        let config = CoreConfig::builder().build().unwrap();
        assert_eq!(config.sync_tuning(), SyncTuning::default());

        let store = config.store_config();
        assert_eq!(store, StoreConfig::default());
    }
}
