//! # Sync Engine
//!
//! Shared handle around a [`SyncController`] for hosts that call in from
//! several places: UI callbacks, the periodic drift tick and offset lookups.
//!
//! ## Overview
//!
//! - All controller access goes through one `tokio::sync::Mutex`, so a tick
//!   and a user action never interleave.
//! - The drift ticker is a background task driven by `tokio::time::interval`
//!   and stopped through a `CancellationToken`.
//! - Offset lookups run without holding the lock. Their result is applied
//!   only if no file was replaced and the offset was not changed by hand
//!   while the store was being queried.
//! - The offset store can be swapped mid-session, e.g. when the user picks
//!   another database file.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::new(controller, store, tuning.correction_interval);
//! engine.start_ticker().await;
//!
//! engine.select_primary_file("/movies/film.mkv").await?;
//! engine.select_secondary_file("/riffs/riff.mp3").await?;
//! engine.toggle_sync().await;
//! engine.save_offset().await?;
//!
//! engine.shutdown().await;
//! ```

use crate::controller::{LookupOutcome, SyncController};
use crate::error::Result;
use crate::snapshot::{SyncSnapshot, TrackIdentities};
use crate::state::{CorrectionOutcome, SyncState};
use core_store::{ContentIdentity, OffsetStore, StoreBackend};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Running drift ticker
struct Ticker {
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Serialized access to the controller plus the background drift ticker.
pub struct SyncEngine {
    controller: Arc<Mutex<SyncController>>,
    store: RwLock<Arc<dyn OffsetStore>>,
    correction_interval: Duration,
    ticker: Mutex<Option<Ticker>>,
}

impl SyncEngine {
    pub fn new(
        controller: SyncController,
        store: Arc<dyn OffsetStore>,
        correction_interval: Duration,
    ) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            store: RwLock::new(store),
            correction_interval,
            ticker: Mutex::new(None),
        }
    }

    pub async fn store_backend(&self) -> StoreBackend {
        self.store.read().await.backend()
    }

    /// Offset store currently in use.
    pub async fn store(&self) -> Arc<dyn OffsetStore> {
        Arc::clone(&*self.store.read().await)
    }

    /// Use `store` for every following lookup and save.
    ///
    /// A lookup already in flight finishes against the previous store.
    pub async fn replace_store(&self, store: Arc<dyn OffsetStore>) {
        let backend = store.backend();
        *self.store.write().await = store;
        info!(%backend, "Offset store replaced");
    }

    // ------------------------------------------------------------------
    // Drift ticker
    // ------------------------------------------------------------------

    /// Start the periodic drift correction. No-op if already running.
    pub async fn start_ticker(&self) {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            return;
        }

        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();
        let controller = Arc::clone(&self.controller);
        let period = self.correction_interval;

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let outcome = controller.lock().await.correct_drift().await;
                        if let CorrectionOutcome::Corrected { from, to } = outcome {
                            debug!(?from, ?to, "Drift tick corrected riff position");
                        }
                    }
                }
            }

            debug!("Drift ticker stopped");
        });

        info!(interval = ?period, "Drift ticker started");
        *ticker = Some(Ticker {
            cancellation_token,
            handle,
        });
    }

    /// Stop the periodic drift correction and wait for the task to exit.
    pub async fn stop_ticker(&self) {
        let running = self.ticker.lock().await.take();
        if let Some(ticker) = running {
            ticker.cancellation_token.cancel();
            if let Err(e) = ticker.handle.await {
                warn!(error = %e, "Drift ticker task ended abnormally");
            }
        }
    }

    pub async fn is_ticker_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Stop background work. The engine can still be used directly.
    pub async fn shutdown(&self) {
        self.stop_ticker().await;
        info!("Sync engine shut down");
    }

    // ------------------------------------------------------------------
    // Lock and offset
    // ------------------------------------------------------------------

    pub async fn enable_sync(&self) -> SyncState {
        self.controller.lock().await.enable_sync().await
    }

    pub async fn disable_sync(&self) -> SyncState {
        self.controller.lock().await.disable_sync()
    }

    pub async fn toggle_sync(&self) -> SyncState {
        self.controller.lock().await.toggle_sync().await
    }

    pub async fn set_offset(&self, value: f64) -> Result<CorrectionOutcome> {
        self.controller.lock().await.set_offset(value).await
    }

    pub async fn state(&self) -> SyncState {
        self.controller.lock().await.state()
    }

    /// Run one drift correction pass now.
    pub async fn correct_drift(&self) -> CorrectionOutcome {
        self.controller.lock().await.correct_drift().await
    }

    // ------------------------------------------------------------------
    // Offset store
    // ------------------------------------------------------------------

    /// Look up and apply the stored offset for the current pair.
    ///
    /// The store is queried without holding the controller lock.
    #[instrument(skip(self))]
    pub async fn load_offset(&self) -> Result<LookupOutcome> {
        let ticket = self.controller.lock().await.lookup_ticket()?;

        let store = self.store().await;
        let found = store.get_offset(&ticket.video, &ticket.audio).await;

        let mut controller = self.controller.lock().await;
        let found = found.map_err(|e| controller.store_failure("load", e))?;
        controller.apply_lookup(&ticket, found).await
    }

    /// Persist the current offset for the current pair.
    pub async fn save_offset(&self) -> Result<()> {
        let store = self.store().await;
        let controller = self.controller.lock().await;
        controller.save_offset_to_store(store.as_ref()).await
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Switch the video file, then apply any stored offset for the new pair.
    pub async fn select_primary_file(&self, path: impl AsRef<Path>) -> Result<ContentIdentity> {
        self.select_file(path.as_ref(), true).await
    }

    /// Switch the riff file, then apply any stored offset for the new pair.
    pub async fn select_secondary_file(&self, path: impl AsRef<Path>) -> Result<ContentIdentity> {
        self.select_file(path.as_ref(), false).await
    }

    #[instrument(skip(self, path))]
    async fn select_file(&self, path: &Path, primary: bool) -> Result<ContentIdentity> {
        let restart_ticker = self.is_ticker_running().await;
        self.stop_ticker().await;

        let replaced = {
            let mut controller = self.controller.lock().await;
            if primary {
                controller.replace_primary_file(path).await
            } else {
                controller.replace_secondary_file(path).await
            }
        };

        if restart_ticker {
            self.start_ticker().await;
        }

        let identity = replaced?;

        let file_name = core_runtime::logging::strip_path(&path.to_string_lossy()).to_string();
        if let Err(e) = self.store().await.remember_file(&identity, &file_name).await {
            warn!(error = %e, "Could not record file name");
        }

        if self.identities().await.both().is_some() {
            match self.load_offset().await {
                Ok(outcome) => debug!(?outcome, "Offset lookup after file change"),
                // Already logged and published by the controller
                Err(e) => debug!(error = %e, "Offset lookup after file change failed"),
            }
        }

        Ok(identity)
    }

    // ------------------------------------------------------------------
    // Seeking and transport
    // ------------------------------------------------------------------

    pub async fn seek_primary(&self, position: Duration) -> Result<()> {
        self.controller.lock().await.seek_primary(position).await
    }

    pub async fn seek_secondary(&self, position: Duration) -> Result<()> {
        self.controller.lock().await.seek_secondary(position).await
    }

    pub async fn play(&self) -> Result<()> {
        self.controller.lock().await.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.controller.lock().await.pause().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.controller.lock().await.stop().await
    }

    pub async fn toggle_playback(&self) -> Result<bool> {
        self.controller.lock().await.toggle_playback().await
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    pub async fn snapshot(&self) -> SyncSnapshot {
        self.controller.lock().await.snapshot().await
    }

    pub async fn identities(&self) -> TrackIdentities {
        self.controller.lock().await.identities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use async_trait::async_trait;
    use bridge_traits::{MediaTrack, PlaybackResult};
    use core_runtime::config::SyncTuning;
    use core_runtime::events::{CoreEvent, EventBus, StoreEvent};
    use core_store::StoreError;
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store that never has an offset and accepts every write.
    struct EmptyStore;

    #[async_trait]
    impl OffsetStore for EmptyStore {
        async fn get_offset(
            &self,
            _video: &ContentIdentity,
            _audio: &ContentIdentity,
        ) -> core_store::Result<Option<f64>> {
            Ok(None)
        }

        async fn put_offset(
            &self,
            _video: &ContentIdentity,
            _audio: &ContentIdentity,
            _offset_seconds: f64,
        ) -> core_store::Result<()> {
            Ok(())
        }

        async fn remember_file(
            &self,
            _identity: &ContentIdentity,
            _display_name: &str,
        ) -> core_store::Result<()> {
            Ok(())
        }

        fn backend(&self) -> StoreBackend {
            StoreBackend::Local
        }
    }

    /// Remote store whose service has gone away.
    struct UnreachableStore;

    #[async_trait]
    impl OffsetStore for UnreachableStore {
        async fn get_offset(
            &self,
            _video: &ContentIdentity,
            _audio: &ContentIdentity,
        ) -> core_store::Result<Option<f64>> {
            Err(StoreError::Remote("down".to_string()))
        }

        async fn put_offset(
            &self,
            _video: &ContentIdentity,
            _audio: &ContentIdentity,
            _offset_seconds: f64,
        ) -> core_store::Result<()> {
            Err(StoreError::Remote("down".to_string()))
        }

        async fn remember_file(
            &self,
            _identity: &ContentIdentity,
            _display_name: &str,
        ) -> core_store::Result<()> {
            Err(StoreError::Remote("down".to_string()))
        }

        fn backend(&self) -> StoreBackend {
            StoreBackend::Remote
        }
    }

    /// Track that is always at the start and counts seeks.
    #[derive(Default)]
    struct CountingTrack {
        seeks: AtomicU32,
    }

    #[async_trait]
    impl MediaTrack for CountingTrack {
        async fn play(&self) -> PlaybackResult<()> {
            Ok(())
        }
        async fn pause(&self) -> PlaybackResult<()> {
            Ok(())
        }
        async fn stop(&self) -> PlaybackResult<()> {
            Ok(())
        }
        async fn seek(&self, _position: Duration) -> PlaybackResult<()> {
            self.seeks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn position(&self) -> PlaybackResult<Duration> {
            Ok(Duration::ZERO)
        }
        async fn duration(&self) -> PlaybackResult<Duration> {
            Ok(Duration::from_secs(600))
        }
        async fn is_playing(&self) -> PlaybackResult<bool> {
            Ok(false)
        }
    }

    fn engine(secondary: Arc<CountingTrack>) -> SyncEngine {
        engine_with(secondary, Arc::new(EmptyStore), Arc::new(EventBus::default()))
    }

    fn engine_with(
        secondary: Arc<CountingTrack>,
        store: Arc<dyn OffsetStore>,
        event_bus: Arc<EventBus>,
    ) -> SyncEngine {
        let controller = SyncController::new(
            Arc::new(CountingTrack::default()),
            secondary,
            SyncTuning::default(),
            event_bus,
        );
        SyncEngine::new(controller, store, Duration::from_secs(10))
    }

    fn media_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    fn operation_failures(events: &mut core_runtime::events::Receiver<CoreEvent>) -> Vec<String> {
        let mut operations = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let CoreEvent::Store(StoreEvent::OperationFailed { operation, .. }) = event {
                operations.push(operation);
            }
        }
        operations
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_corrects_on_interval() {
        let riff = Arc::new(CountingTrack::default());
        let engine = engine(Arc::clone(&riff));

        // Lock at a 5 s offset: the riff sits at 0 s instead of 5 s
        engine.set_offset(5.0).await.unwrap();
        assert_eq!(riff.seeks.load(Ordering::SeqCst), 1);

        engine.start_ticker().await;
        assert!(engine.is_ticker_running().await);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(riff.seeks.load(Ordering::SeqCst), 3);

        engine.shutdown().await;
        assert!(!engine.is_ticker_running().await);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(riff.seeks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_idle_while_unsynced() {
        let riff = Arc::new(CountingTrack::default());
        let engine = engine(Arc::clone(&riff));

        engine.start_ticker().await;
        engine.start_ticker().await;
        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(riff.seeks.load(Ordering::SeqCst), 0);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_load_offset_requires_files() {
        let engine = engine(Arc::new(CountingTrack::default()));
        assert!(engine.load_offset().await.is_err());
        assert_eq!(engine.store_backend().await, StoreBackend::Local);
    }

    #[tokio::test]
    async fn test_store_failures_surfaced_and_published() {
        let bus = Arc::new(EventBus::new(32));
        let mut events = bus.subscribe();
        let engine = engine_with(
            Arc::new(CountingTrack::default()),
            Arc::new(UnreachableStore),
            Arc::clone(&bus),
        );
        let video = media_file(b"V1");
        let riff = media_file(b"A1");

        // The automatic lookup fails quietly; choosing the file still works
        engine.select_primary_file(video.path()).await.unwrap();
        engine.select_secondary_file(riff.path()).await.unwrap();
        assert_eq!(operation_failures(&mut events), vec!["load".to_string()]);
        assert!(!engine.state().await.synced);

        let err = engine.load_offset().await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Remote(_))));

        engine.set_offset(1.5).await.unwrap();
        let err = engine.save_offset().await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Remote(_))));

        assert_eq!(
            operation_failures(&mut events),
            vec!["load".to_string(), "save".to_string()]
        );
        assert_eq!(engine.state().await.offset, 1.5);
    }

    #[tokio::test]
    async fn test_replaced_store_serves_following_calls() {
        let engine = engine(Arc::new(CountingTrack::default()));
        let video = media_file(b"V1");
        let riff = media_file(b"A1");
        engine.select_primary_file(video.path()).await.unwrap();
        engine.select_secondary_file(riff.path()).await.unwrap();
        assert_eq!(engine.load_offset().await.unwrap(), LookupOutcome::NotFound);

        engine.replace_store(Arc::new(UnreachableStore)).await;

        assert_eq!(engine.store_backend().await, StoreBackend::Remote);
        assert!(matches!(
            engine.load_offset().await,
            Err(SyncError::Store(_))
        ));
    }
}
