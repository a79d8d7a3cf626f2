use bridge_traits::{PlaybackError, TrackRole};
use core_store::{IdentityError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Rejected offset value; a configuration error, the state is unchanged.
    #[error("Invalid offset {value}: must be finite and within ±{max} seconds")]
    InvalidOffset { value: f64, max: f64 },

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Offset store error: {0}")]
    Store(#[from] StoreError),

    #[error("{role} track error: {source}")]
    Playback {
        role: TrackRole,
        #[source]
        source: PlaybackError,
    },

    #[error("No {role} file has been identified")]
    UnresolvedTrack { role: TrackRole },
}

impl SyncError {
    pub(crate) fn playback(role: TrackRole) -> impl FnOnce(PlaybackError) -> SyncError {
        move |source| SyncError::Playback { role, source }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
