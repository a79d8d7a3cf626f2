//! Startup choice between the shared offset service and the local database.
//!
//! The remote service is probed once, when the store is opened. If it does
//! not answer with a 2xx status in time, the session uses the local database
//! and never retries the remote.

use crate::error::Result;
use crate::local::SqliteOffsetStore;
use crate::remote::RemoteOffsetStore;
use crate::store::OffsetStore;
use bridge_traits::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::config::StoreConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Open the offset store for this session.
///
/// Uses the local database when `force_local` is set, when no remote URL is
/// configured, when no HTTP client is available, or when the probe fails.
pub async fn open_offset_store(
    config: &StoreConfig,
    http: Option<Arc<dyn HttpClient>>,
) -> Result<Arc<dyn OffsetStore>> {
    let remote = match (&config.remote_url, http) {
        (Some(url), Some(http)) if !config.force_local => Some((url.clone(), http)),
        _ => None,
    };

    if let Some((url, http)) = remote {
        if probe_remote(http.as_ref(), &url, config).await {
            info!(url = %url, "Using remote offset store");
            return Ok(Arc::new(RemoteOffsetStore::new(
                http,
                url,
                config.remote_timeout,
            )));
        }
    }

    let store =
        SqliteOffsetStore::open(&config.database_path, config.overwrite_database).await?;
    info!(path = %config.database_path.display(), "Using local offset store");
    Ok(Arc::new(store))
}

async fn probe_remote(http: &dyn HttpClient, url: &str, config: &StoreConfig) -> bool {
    let request = HttpRequest::new(HttpMethod::Get, url).timeout(config.remote_timeout);

    match tokio::time::timeout(config.remote_timeout, http.execute(request)).await {
        Ok(Ok(response)) if response.is_success() => true,
        Ok(Ok(response)) => {
            warn!(url = %url, status = response.status, "Remote offset store unavailable");
            false
        }
        Ok(Err(e)) => {
            warn!(url = %url, error = %e, "Remote offset store unreachable");
            false
        }
        Err(_) => {
            warn!(url = %url, timeout = ?config.remote_timeout, "Remote offset store probe timed out");
            false
        }
    }
}
