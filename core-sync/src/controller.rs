//! # Sync Controller
//!
//! Couples a primary (video) and a secondary (riff audio) [`MediaTrack`] by a
//! constant offset and remembers offsets per pair of file identities.
//!
//! ## Overview
//!
//! The controller owns the two track handles, the identity of the file
//! loaded into each, and the [`SyncState`]. Hosts forward user actions to it:
//!
//! - toggling the lock measures the offset from the live positions
//! - entering an offset locks the tracks and re-aligns the riff immediately
//! - seeking either track moves its partner when locked
//! - a periodic tick re-seeks the riff when it drifts past the threshold
//! - choosing a file resets the pair and identifies the new content
//!
//! Every method that mutates state takes `&mut self`; the
//! [`SyncEngine`](crate::engine::SyncEngine) serializes access for hosts that
//! drive the controller from several tasks.
//!
//! ## Error Policy
//!
//! Track errors are swallowed during drift correction (a track that is not
//! ready simply skips the tick) but surfaced to the caller for user-initiated
//! seeks and transport commands.

use crate::error::{Result, SyncError};
use crate::snapshot::{SyncSnapshot, TrackIdentities, TrackStatus};
use crate::state::{
    seconds_between, shifted_position, validate_offset, CorrectionOutcome, SyncState,
};
use bridge_traits::{MediaTrack, PlaybackResult, TrackRole};
use core_runtime::config::SyncTuning;
use core_runtime::events::{CoreEvent, EventBus, OffsetSource, StoreEvent, SyncEvent};
use core_runtime::logging::strip_path;
use core_store::{ContentHasher, ContentIdentity, OffsetStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// File loaded on one side of the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub path: PathBuf,
    pub identity: ContentIdentity,
}

impl ResolvedSource {
    pub fn file_name(&self) -> String {
        strip_path(&self.path.to_string_lossy()).to_string()
    }
}

struct TrackSlot {
    track: Arc<dyn MediaTrack>,
    source: Option<ResolvedSource>,
}

/// Snapshot of what an offset lookup needs, taken under the engine lock.
///
/// The lookup itself can then run without the lock; the result is only
/// applied if no file was replaced and the lock or offset was not changed by
/// the user in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub generation: u64,
    pub video: ContentIdentity,
    pub audio: ContentIdentity,
}

/// What happened to a completed offset lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupOutcome {
    /// The stored offset was applied and the tracks are synced
    Applied(f64),
    /// The store has no offset for this pair; state unchanged
    NotFound,
    /// A file was replaced or the offset changed by hand while the lookup
    /// ran; result discarded
    Stale,
}

/// Clears the correction flag when a pass ends, even if it is cancelled.
struct CorrectionGuard<'a>(&'a AtomicBool);

impl<'a> CorrectionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CorrectionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State machine coupling the two tracks.
pub struct SyncController {
    primary: TrackSlot,
    secondary: TrackSlot,
    state: SyncState,
    hasher: ContentHasher,
    drift_threshold: Duration,
    generation: u64,
    correcting: AtomicBool,
    event_bus: Arc<EventBus>,
}

impl SyncController {
    /// Create a controller in the `Unsynced` state with offset 0 and no
    /// files identified.
    pub fn new(
        primary: Arc<dyn MediaTrack>,
        secondary: Arc<dyn MediaTrack>,
        tuning: SyncTuning,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            primary: TrackSlot {
                track: primary,
                source: None,
            },
            secondary: TrackSlot {
                track: secondary,
                source: None,
            },
            state: SyncState::default(),
            hasher: ContentHasher::new(tuning.hash_sample_size),
            drift_threshold: tuning.drift_threshold,
            generation: 0,
            correcting: AtomicBool::new(false),
            event_bus,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_synced(&self) -> bool {
        self.state.synced
    }

    pub fn offset(&self) -> f64 {
        self.state.offset
    }

    /// Counter bumped on every file replacement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn drift_threshold(&self) -> Duration {
        self.drift_threshold
    }

    pub fn source(&self, role: TrackRole) -> Option<&ResolvedSource> {
        self.slot(role).source.as_ref()
    }

    /// Identities of the loaded files, for the hash display.
    pub fn identities(&self) -> TrackIdentities {
        TrackIdentities {
            primary: self.primary.source.as_ref().map(|s| s.identity.clone()),
            secondary: self.secondary.source.as_ref().map(|s| s.identity.clone()),
        }
    }

    fn slot(&self, role: TrackRole) -> &TrackSlot {
        match role {
            TrackRole::Primary => &self.primary,
            TrackRole::Secondary => &self.secondary,
        }
    }

    fn slot_mut(&mut self, role: TrackRole) -> &mut TrackSlot {
        match role {
            TrackRole::Primary => &mut self.primary,
            TrackRole::Secondary => &mut self.secondary,
        }
    }

    fn track(&self, role: TrackRole) -> &dyn MediaTrack {
        self.slot(role).track.as_ref()
    }

    /// Make in-flight offset lookups stale.
    fn invalidate_lookups(&mut self) {
        self.generation += 1;
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }

    fn emit_store(&self, event: StoreEvent) {
        self.event_bus.emit(CoreEvent::Store(event)).ok();
    }

    // ------------------------------------------------------------------
    // Lock and offset
    // ------------------------------------------------------------------

    /// Lock the tracks together.
    ///
    /// When both tracks are playing, the offset is measured from their
    /// current positions. Otherwise the last offset is kept (0 initially).
    /// A track that is not ready counts as not playing.
    #[instrument(skip(self))]
    pub async fn enable_sync(&mut self) -> SyncState {
        self.invalidate_lookups();
        if let Some(measured) = self.measure_offset().await {
            self.state.offset = measured;
            self.emit(SyncEvent::OffsetChanged {
                offset_seconds: measured,
                source: OffsetSource::Measured,
            });
        }

        self.state.synced = true;
        info!(offset = self.state.offset, "Sync enabled");
        self.emit(SyncEvent::SyncEnabled {
            offset_seconds: self.state.offset,
        });
        self.state
    }

    async fn measure_offset(&self) -> Option<f64> {
        let primary = self.track(TrackRole::Primary);
        let secondary = self.track(TrackRole::Secondary);

        let both_playing = matches!(primary.is_playing().await, Ok(true))
            && matches!(secondary.is_playing().await, Ok(true));
        if !both_playing {
            debug!("Tracks not both playing; keeping previous offset");
            return None;
        }

        match (primary.position().await, secondary.position().await) {
            (Ok(video), Ok(riff)) => Some(seconds_between(video, riff)),
            _ => {
                debug!("Track position unavailable; keeping previous offset");
                None
            }
        }
    }

    /// Unlock the tracks. The offset is kept for the next lock.
    pub fn disable_sync(&mut self) -> SyncState {
        self.invalidate_lookups();
        if self.state.synced {
            self.state.synced = false;
            info!(offset = self.state.offset, "Sync disabled");
            self.emit(SyncEvent::SyncDisabled {
                offset_seconds: self.state.offset,
            });
        }
        self.state
    }

    /// Flip between locked and unlocked.
    pub async fn toggle_sync(&mut self) -> SyncState {
        if self.state.synced {
            self.disable_sync()
        } else {
            self.enable_sync().await
        }
    }

    /// Set the offset explicitly, lock the tracks and re-align immediately.
    ///
    /// An invalid value leaves the state untouched.
    #[instrument(skip(self))]
    pub async fn set_offset(&mut self, value: f64) -> Result<CorrectionOutcome> {
        self.apply_offset(value, OffsetSource::Manual).await
    }

    async fn apply_offset(&mut self, value: f64, source: OffsetSource) -> Result<CorrectionOutcome> {
        let value = validate_offset(value)?;
        let was_synced = self.state.synced;
        if source != OffsetSource::Store {
            self.invalidate_lookups();
        }

        self.state.offset = value;
        self.state.synced = true;

        info!(offset = value, ?source, "Offset applied");
        self.emit(SyncEvent::OffsetChanged {
            offset_seconds: value,
            source,
        });
        if !was_synced {
            self.emit(SyncEvent::SyncEnabled {
                offset_seconds: value,
            });
        }

        Ok(self.correct_drift().await)
    }

    // ------------------------------------------------------------------
    // Offset store
    // ------------------------------------------------------------------

    /// Identities and generation for a lookup, or `UnresolvedTrack` if either
    /// side has no identified file.
    pub fn lookup_ticket(&self) -> Result<LookupTicket> {
        let (video, audio) = self.resolved_pair()?;
        Ok(LookupTicket {
            generation: self.generation,
            video: video.clone(),
            audio: audio.clone(),
        })
    }

    fn resolved_pair(&self) -> Result<(&ContentIdentity, &ContentIdentity)> {
        let video = self
            .primary
            .source
            .as_ref()
            .map(|s| &s.identity)
            .ok_or(SyncError::UnresolvedTrack {
                role: TrackRole::Primary,
            })?;
        let audio = self
            .secondary
            .source
            .as_ref()
            .map(|s| &s.identity)
            .ok_or(SyncError::UnresolvedTrack {
                role: TrackRole::Secondary,
            })?;
        Ok((video, audio))
    }

    /// Apply the result of a lookup issued with `ticket`.
    pub async fn apply_lookup(
        &mut self,
        ticket: &LookupTicket,
        found: Option<f64>,
    ) -> Result<LookupOutcome> {
        if ticket.generation != self.generation {
            debug!(
                issued = ticket.generation,
                current = self.generation,
                "Discarding stale offset lookup"
            );
            return Ok(LookupOutcome::Stale);
        }

        match found {
            Some(offset) => {
                self.apply_offset(offset, OffsetSource::Store).await?;
                self.emit_store(StoreEvent::OffsetLoaded {
                    offset_seconds: offset,
                });
                Ok(LookupOutcome::Applied(offset))
            }
            None => {
                debug!("No stored offset for this pair");
                self.emit_store(StoreEvent::OffsetNotFound);
                Ok(LookupOutcome::NotFound)
            }
        }
    }

    /// Look up the stored offset for the current pair and apply it.
    ///
    /// No stored offset leaves the state unchanged. Store failures are
    /// surfaced.
    #[instrument(skip(self, store))]
    pub async fn load_offset_from_store(&mut self, store: &dyn OffsetStore) -> Result<LookupOutcome> {
        let ticket = self.lookup_ticket()?;
        let found = store
            .get_offset(&ticket.video, &ticket.audio)
            .await
            .map_err(|e| self.store_failure("load", e))?;
        self.apply_lookup(&ticket, found).await
    }

    /// Persist the current offset for the current pair.
    #[instrument(skip(self, store))]
    pub async fn save_offset_to_store(&self, store: &dyn OffsetStore) -> Result<()> {
        let (video, audio) = self.resolved_pair()?;
        let offset = self.state.offset;

        store
            .put_offset(video, audio, offset)
            .await
            .map_err(|e| self.store_failure("save", e))?;

        info!(offset, backend = %store.backend(), "Offset saved");
        self.emit_store(StoreEvent::OffsetSaved {
            offset_seconds: offset,
        });
        Ok(())
    }

    /// Log and publish a store failure, then wrap it.
    pub(crate) fn store_failure(&self, operation: &str, error: core_store::StoreError) -> SyncError {
        warn!(operation, error = %error, "Offset store operation failed");
        self.emit_store(StoreEvent::OperationFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        });
        SyncError::Store(error)
    }

    // ------------------------------------------------------------------
    // Seeking and drift
    // ------------------------------------------------------------------

    /// Seek the video; when synced the riff follows at `position + offset`.
    #[instrument(skip(self))]
    pub async fn seek_primary(&mut self, position: Duration) -> Result<()> {
        self.seek_coupled(TrackRole::Primary, position).await
    }

    /// Seek the riff; when synced the video follows at `position - offset`.
    #[instrument(skip(self))]
    pub async fn seek_secondary(&mut self, position: Duration) -> Result<()> {
        self.seek_coupled(TrackRole::Secondary, position).await
    }

    async fn seek_coupled(&self, role: TrackRole, position: Duration) -> Result<()> {
        self.track(role)
            .seek(position)
            .await
            .map_err(SyncError::playback(role))?;

        if !self.state.synced {
            return Ok(());
        }

        let partner = role.other();
        let offset = match role {
            TrackRole::Primary => self.state.offset,
            TrackRole::Secondary => -self.state.offset,
        };

        match self.follow(partner, position, offset).await {
            Err(error) if error.is_not_ready() => {
                debug!(role = %partner, error = %error, "Partner track not ready; left in place");
                Ok(())
            }
            result => result.map_err(SyncError::playback(partner)),
        }
    }

    /// Seek `partner` to `position + offset`, clamped to its length.
    async fn follow(&self, partner: TrackRole, position: Duration, offset: f64) -> PlaybackResult<()> {
        let partner_track = self.track(partner);
        let bound = partner_track.duration().await?;
        let target = shifted_position(position, offset, bound);

        debug!(role = %partner, ?position, ?target, "Seeking partner track");
        partner_track.seek(target).await
    }

    /// One drift correction pass.
    ///
    /// When synced, re-seeks the riff to `video position + offset` if it has
    /// drifted further than the threshold. Track errors end the pass
    /// quietly. A pass that starts while another is running is skipped.
    pub async fn correct_drift(&self) -> CorrectionOutcome {
        if !self.state.synced {
            return CorrectionOutcome::Skipped;
        }

        let Some(_guard) = CorrectionGuard::acquire(&self.correcting) else {
            debug!("Drift correction already running");
            return CorrectionOutcome::Skipped;
        };

        match self.correct_drift_inner().await {
            Ok(outcome) => outcome,
            Err(error) => {
                debug!(error = %error, "Drift correction skipped; track not ready");
                CorrectionOutcome::NotReady
            }
        }
    }

    async fn correct_drift_inner(&self) -> PlaybackResult<CorrectionOutcome> {
        let primary = self.track(TrackRole::Primary);
        let secondary = self.track(TrackRole::Secondary);

        let video_position = primary.position().await?;
        let riff_length = secondary.duration().await?;
        let riff_position = secondary.position().await?;

        let expected = shifted_position(video_position, self.state.offset, riff_length);
        let drift = if expected > riff_position {
            expected - riff_position
        } else {
            riff_position - expected
        };

        if drift <= self.drift_threshold {
            return Ok(CorrectionOutcome::WithinThreshold);
        }

        secondary.seek(expected).await?;

        debug!(?drift, from = ?riff_position, to = ?expected, "Corrected riff drift");
        self.emit(SyncEvent::DriftCorrected {
            from_ms: riff_position.as_millis() as u64,
            to_ms: expected.as_millis() as u64,
        });

        Ok(CorrectionOutcome::Corrected {
            from: riff_position,
            to: expected,
        })
    }

    // ------------------------------------------------------------------
    // File replacement
    // ------------------------------------------------------------------

    /// A new video file was chosen.
    pub async fn replace_primary_file(&mut self, path: impl AsRef<Path>) -> Result<ContentIdentity> {
        self.replace_file(TrackRole::Primary, path.as_ref()).await
    }

    /// A new riff file was chosen.
    pub async fn replace_secondary_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<ContentIdentity> {
        self.replace_file(TrackRole::Secondary, path.as_ref()).await
    }

    /// Stop both tracks, forget the offset and identify the new file.
    ///
    /// If hashing fails the role stays unresolved and the error is returned.
    #[instrument(skip(self, path))]
    async fn replace_file(&mut self, role: TrackRole, path: &Path) -> Result<ContentIdentity> {
        for side in [TrackRole::Primary, TrackRole::Secondary] {
            if let Err(error) = self.track(side).stop().await {
                debug!(role = %side, error = %error, "Ignoring stop failure during file change");
            }
        }

        let was_synced = self.state.synced;
        self.state = SyncState::default();
        self.invalidate_lookups();
        self.slot_mut(role).source = None;

        if was_synced {
            self.emit(SyncEvent::SyncDisabled {
                offset_seconds: 0.0,
            });
        }

        let file_name = strip_path(&path.to_string_lossy()).to_string();

        match self.hasher.hash_file(path).await {
            Ok(identity) => {
                info!(file = %file_name, identity = identity.short(), "Media file identified");
                self.emit(SyncEvent::FileReplaced {
                    role: role.to_string(),
                    identity: identity.to_string(),
                });
                self.slot_mut(role).source = Some(ResolvedSource {
                    path: path.to_path_buf(),
                    identity: identity.clone(),
                });
                Ok(identity)
            }
            Err(error) => {
                warn!(file = %file_name, error = %error, "Could not identify media file");
                self.emit(SyncEvent::IdentityFailed {
                    role: role.to_string(),
                    message: error.to_string(),
                });
                Err(error.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Play both tracks. Both files must be identified.
    pub async fn play(&mut self) -> Result<()> {
        self.resolved_pair()?;
        self.for_both(|track| async move { track.play().await }).await
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.for_both(|track| async move { track.pause().await }).await
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.for_both(|track| async move { track.stop().await }).await
    }

    /// Pause both tracks if either is playing; otherwise play both when
    /// both files are identified. Returns whether playback is now running.
    pub async fn toggle_playback(&mut self) -> Result<bool> {
        let primary_playing = matches!(self.primary.track.is_playing().await, Ok(true));
        let secondary_playing = matches!(self.secondary.track.is_playing().await, Ok(true));

        if primary_playing || secondary_playing {
            self.pause().await?;
            return Ok(false);
        }

        if self.resolved_pair().is_err() {
            debug!("Play requested before both files were chosen");
            return Ok(false);
        }

        self.play().await?;
        Ok(true)
    }

    /// Run `op` on both tracks, attempting the second even if the first
    /// fails, and report the first failure.
    async fn for_both<F, Fut>(&self, op: F) -> Result<()>
    where
        F: Fn(Arc<dyn MediaTrack>) -> Fut,
        Fut: std::future::Future<Output = PlaybackResult<()>>,
    {
        let primary = op(Arc::clone(&self.primary.track))
            .await
            .map_err(SyncError::playback(TrackRole::Primary));
        let secondary = op(Arc::clone(&self.secondary.track))
            .await
            .map_err(SyncError::playback(TrackRole::Secondary));
        primary.and(secondary)
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Current positions, lock state and identities.
    pub async fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            synced: self.state.synced,
            offset: self.state.offset,
            primary: self.track_status(TrackRole::Primary).await,
            secondary: self.track_status(TrackRole::Secondary).await,
        }
    }

    async fn track_status(&self, role: TrackRole) -> Option<TrackStatus> {
        let slot = self.slot(role);
        let position = slot.track.position().await.ok()?;

        Some(TrackStatus {
            position,
            duration: slot.track.duration().await.unwrap_or_default(),
            playing: slot.track.is_playing().await.unwrap_or(false),
            identity: slot.source.as_ref().map(|s| s.identity.clone()),
            file_name: slot.source.as_ref().map(ResolvedSource::file_name),
        })
    }
}
