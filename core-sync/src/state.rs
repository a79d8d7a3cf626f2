//! # Sync State
//!
//! The two-state machine at the heart of the engine and the offset arithmetic
//! shared by seeking and drift correction.
//!
//! ## State Machine
//!
//! ```text
//!            enable_sync / set_offset
//! Unsynced ───────────────────────────→ Synced
//!    ↑                                     │
//!    └──────── disable_sync ───────────────┘
//!    └──────── file replaced (offset reset to 0) ──┘
//! ```
//!
//! The offset is the secondary position minus the primary position, in
//! seconds. It is signed: a negative offset means the riff starts before the
//! video.

use crate::error::{Result, SyncError};
use serde::Serialize;
use std::time::Duration;

/// Largest accepted offset magnitude (three hours).
pub const MAX_OFFSET_SECONDS: f64 = 3.0 * 60.0 * 60.0;

/// Offset and lock flag owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncState {
    pub offset: f64,
    pub synced: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            offset: 0.0,
            synced: false,
        }
    }
}

impl SyncState {
    pub fn is_synced(&self) -> bool {
        self.synced
    }
}

/// Result of one drift correction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// Not synced, or another correction was already running
    Skipped,
    /// Drift was at or below the threshold; nothing was seeked
    WithinThreshold,
    /// The secondary track was re-seeked
    Corrected { from: Duration, to: Duration },
    /// A track could not report its position or accept the seek
    NotReady,
}

/// Reject offsets that are not finite or exceed [`MAX_OFFSET_SECONDS`].
pub fn validate_offset(value: f64) -> Result<f64> {
    if value.is_finite() && value.abs() <= MAX_OFFSET_SECONDS {
        Ok(value)
    } else {
        Err(SyncError::InvalidOffset {
            value,
            max: MAX_OFFSET_SECONDS,
        })
    }
}

/// `position + offset_seconds`, clamped to `[0, bound]`.
pub fn shifted_position(position: Duration, offset_seconds: f64, bound: Duration) -> Duration {
    let target = position.as_secs_f64() + offset_seconds;
    Duration::from_secs_f64(target.clamp(0.0, bound.as_secs_f64()))
}

/// Signed `later - earlier` in seconds.
pub fn seconds_between(earlier: Duration, later: Duration) -> f64 {
    later.as_secs_f64() - earlier.as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SyncState::default();
        assert_eq!(state.offset, 0.0);
        assert!(!state.is_synced());
    }

    #[test]
    fn test_validate_offset() {
        assert_eq!(validate_offset(2.5).unwrap(), 2.5);
        assert_eq!(validate_offset(-2.5).unwrap(), -2.5);
        assert_eq!(validate_offset(MAX_OFFSET_SECONDS).unwrap(), MAX_OFFSET_SECONDS);
        assert!(validate_offset(MAX_OFFSET_SECONDS + 0.001).is_err());
        assert!(validate_offset(-MAX_OFFSET_SECONDS - 1.0).is_err());
        assert!(validate_offset(f64::NAN).is_err());
        assert!(validate_offset(f64::INFINITY).is_err());
    }

    #[test]
    fn test_shifted_position() {
        let bound = Duration::from_secs(100);
        assert_eq!(
            shifted_position(Duration::from_secs(10), 2.0, bound),
            Duration::from_secs(12)
        );
        assert_eq!(
            shifted_position(Duration::from_secs(10), -2.5, bound),
            Duration::from_millis(7_500)
        );
    }

    #[test]
    fn test_shifted_position_clamps() {
        let bound = Duration::from_secs(60);
        assert_eq!(
            shifted_position(Duration::from_secs(1), -5.0, bound),
            Duration::ZERO
        );
        assert_eq!(shifted_position(Duration::from_secs(59), 5.0, bound), bound);
        assert_eq!(
            shifted_position(Duration::from_secs(5), 1.0, Duration::ZERO),
            Duration::ZERO
        );
    }

    #[test]
    fn test_seconds_between() {
        assert_eq!(
            seconds_between(Duration::from_secs(5), Duration::from_millis(7_500)),
            2.5
        );
        assert_eq!(
            seconds_between(Duration::from_millis(7_500), Duration::from_secs(5)),
            -2.5
        );
    }
}
