//! Media track bridge trait and supporting types.
//!
//! The sync engine couples two timelines: the primary (video) track and the
//! secondary (riff audio) track. Each is owned and decoded by the host; the
//! engine only needs transport control, seeking and position queries, which
//! this module captures as the [`MediaTrack`] capability set.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`MediaTrack`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// No source is loaded, or the source is still opening.
    #[error("Track not ready: {0}")]
    NotReady(String),

    /// The requested position cannot be reached on this source.
    #[error("Seek to {0:?} rejected")]
    SeekRejected(Duration),

    /// Any other backend failure.
    #[error("Playback backend failure: {0}")]
    Backend(String),
}

impl PlaybackError {
    /// Returns `true` when the error only means "nothing playable yet".
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PlaybackError::NotReady(_))
    }
}

/// Convenience result type alias for track operations.
pub type PlaybackResult<T> = std::result::Result<T, PlaybackError>;

/// Which side of the synchronized pair a track plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackRole {
    /// The video timeline; the reference clock when synced.
    Primary,
    /// The riff audio timeline; slaved to the primary when synced.
    Secondary,
}

impl TrackRole {
    /// The role on the other side of the pair.
    pub fn other(self) -> Self {
        match self {
            TrackRole::Primary => TrackRole::Secondary,
            TrackRole::Secondary => TrackRole::Primary,
        }
    }
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackRole::Primary => write!(f, "video"),
            TrackRole::Secondary => write!(f, "riff"),
        }
    }
}

/// A decoded media timeline controlled by the host.
///
/// All methods take `&self`; implementations are expected to use interior
/// mutability (most native players already do). Every call may fail with
/// [`PlaybackError::NotReady`] when no source is loaded.
#[async_trait::async_trait]
pub trait MediaTrack: Send + Sync {
    /// Begin or resume playback.
    async fn play(&self) -> PlaybackResult<()>;

    /// Pause playback without releasing the source.
    async fn pause(&self) -> PlaybackResult<()>;

    /// Stop playback and rewind to the start.
    async fn stop(&self) -> PlaybackResult<()>;

    /// Seek to an absolute position within the source.
    async fn seek(&self, position: Duration) -> PlaybackResult<()>;

    /// Current playback position.
    async fn position(&self) -> PlaybackResult<Duration>;

    /// Total length of the loaded source.
    async fn duration(&self) -> PlaybackResult<Duration>;

    /// Whether the track is currently playing.
    async fn is_playing(&self) -> PlaybackResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_is_distinguished() {
        assert!(PlaybackError::NotReady("no source".into()).is_not_ready());
        assert!(!PlaybackError::Backend("boom".into()).is_not_ready());
        assert!(!PlaybackError::SeekRejected(Duration::from_secs(3)).is_not_ready());
    }

    #[test]
    fn track_role_other_side() {
        assert_eq!(TrackRole::Primary.other(), TrackRole::Secondary);
        assert_eq!(TrackRole::Secondary.other(), TrackRole::Primary);
        assert_eq!(TrackRole::Primary.to_string(), "video");
        assert_eq!(TrackRole::Secondary.to_string(), "riff");
    }
}
