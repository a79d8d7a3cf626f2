//! Read-only view of the engine for rendering.

use core_store::ContentIdentity;
use serde::Serialize;
use std::time::Duration;

/// Position and identity of one track, as last observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackStatus {
    pub position: Duration,
    pub duration: Duration,
    pub playing: bool,
    pub identity: Option<ContentIdentity>,
    pub file_name: Option<String>,
}

impl TrackStatus {
    /// `HH:MM:SS` label for the current position.
    pub fn position_label(&self) -> String {
        format_timestamp(self.position)
    }
}

/// Everything a host needs to draw the player controls.
///
/// A side is `None` when its track could not report a position, usually
/// because nothing is loaded yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub synced: bool,
    pub offset: f64,
    pub primary: Option<TrackStatus>,
    pub secondary: Option<TrackStatus>,
}

/// Identities of the files currently loaded on each side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackIdentities {
    pub primary: Option<ContentIdentity>,
    pub secondary: Option<ContentIdentity>,
}

impl TrackIdentities {
    pub fn both(&self) -> Option<(&ContentIdentity, &ContentIdentity)> {
        self.primary.as_ref().zip(self.secondary.as_ref())
    }
}

/// Render a position as `HH:MM:SS`, truncating fractional seconds.
pub fn format_timestamp(position: Duration) -> String {
    let total = position.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
