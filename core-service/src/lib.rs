//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided media tracks and the configuration into
//! the shared Rust core: it selects the offset store for the session, creates
//! the event bus and hands back a ready [`SyncEngine`]. The user can later
//! switch to another local database with
//! [`CoreService::open_local_database`]. Desktop apps
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so a reqwest HTTP client is available for the remote
//! offset service.

pub mod error;

pub use error::{CoreError, Result};

use std::path::Path;
use std::sync::Arc;

use bridge_traits::MediaTrack;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, StoreEvent};
use core_store::{open_offset_store, SqliteOffsetStore, StoreBackend};
use core_sync::{LookupOutcome, SyncController, SyncEngine};
use tokio::sync::RwLock;
use tracing::{info, instrument};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::ReqwestHttpClient;

/// Host handles the core requires.
pub struct CoreDependencies {
    pub primary_track: Arc<dyn MediaTrack>,
    pub secondary_track: Arc<dyn MediaTrack>,
    pub event_bus: Option<Arc<EventBus>>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from the video and riff tracks.
    pub fn new(primary_track: Arc<dyn MediaTrack>, secondary_track: Arc<dyn MediaTrack>) -> Self {
        Self {
            primary_track,
            secondary_track,
            event_bus: None,
        }
    }

    /// Publish on an existing bus instead of creating one.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }
}

/// Backend and location of the offset store in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSelection {
    pub backend: StoreBackend,
    /// Database path or remote URL
    pub location: String,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    engine: Arc<SyncEngine>,
    event_bus: Arc<EventBus>,
    store: Arc<RwLock<StoreSelection>>,
}

impl CoreService {
    /// Select the offset store, build the engine and start the drift ticker.
    pub async fn bootstrap(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let event_bus = deps
            .event_bus
            .unwrap_or_else(|| Arc::new(EventBus::new(config.event_buffer_size)));

        let store = open_offset_store(&config.store_config(), config.http_client.clone()).await?;
        let backend = store.backend();
        let selection = StoreSelection {
            backend,
            location: match backend {
                StoreBackend::Remote => config.remote_url.clone().unwrap_or_default(),
                StoreBackend::Local => config.database_path.display().to_string(),
            },
        };
        announce_store(&event_bus, &selection);

        let tuning = config.sync_tuning();
        let controller = SyncController::new(
            deps.primary_track,
            deps.secondary_track,
            tuning,
            Arc::clone(&event_bus),
        );
        let engine = Arc::new(SyncEngine::new(
            controller,
            store,
            tuning.correction_interval,
        ));
        engine.start_ticker().await;

        Ok(Self {
            config: Arc::new(config),
            engine,
            event_bus,
            store: Arc::new(RwLock::new(selection)),
        })
    }

    /// Switch the session to the local database at `path`.
    ///
    /// Same rules as at startup: a missing file is created, `overwrite`
    /// recreates the schema, and an existing file must already hold the
    /// offset tables. On failure the current store stays in use. When both
    /// files are identified, the offset stored in the new database is looked
    /// up and applied.
    #[instrument(skip(self, path))]
    pub async fn open_local_database(
        &self,
        path: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<Option<LookupOutcome>> {
        let path = path.as_ref();
        let store = SqliteOffsetStore::open(path, overwrite).await?;

        let selection = StoreSelection {
            backend: StoreBackend::Local,
            location: path.display().to_string(),
        };
        {
            let mut current = self.store.write().await;
            self.engine.replace_store(Arc::new(store)).await;
            *current = selection.clone();
        }
        announce_store(&self.event_bus, &selection);

        if self.engine.identities().await.both().is_none() {
            return Ok(None);
        }
        Ok(Some(self.engine.load_offset().await?))
    }

    /// Shared handle for forwarding user actions.
    pub fn engine(&self) -> Arc<SyncEngine> {
        Arc::clone(&self.engine)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Backend and location of the offset store in use.
    pub async fn store_selection(&self) -> StoreSelection {
        self.store.read().await.clone()
    }

    pub async fn store_backend(&self) -> StoreBackend {
        self.store.read().await.backend
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Stream of engine and store events published from now on.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Stop the drift ticker.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

fn announce_store(event_bus: &EventBus, selection: &StoreSelection) {
    info!(backend = %selection.backend, location = %selection.location, "Offset store ready");
    event_bus
        .emit(CoreEvent::Store(StoreEvent::BackendSelected {
            backend: selection.backend.to_string(),
            location: selection.location.clone(),
        }))
        .ok();
}
