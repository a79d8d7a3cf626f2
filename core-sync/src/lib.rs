//! # Riff Sync
//!
//! Keeps a riff audio track aligned with a video track.
//!
//! ## Overview
//!
//! - **State** (`state`): the `Unsynced`/`Synced` machine and offset arithmetic
//! - **Controller** (`controller`): couples two [`bridge_traits::MediaTrack`]s,
//!   corrects drift and identifies chosen files
//! - **Engine** (`engine`): serialized shared handle with the periodic drift
//!   ticker and offset store lookups
//! - **Snapshot** (`snapshot`): read-only view for rendering

pub mod controller;
pub mod engine;
pub mod error;
pub mod snapshot;
pub mod state;

pub use controller::{LookupOutcome, LookupTicket, ResolvedSource, SyncController};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use snapshot::{format_timestamp, SyncSnapshot, TrackIdentities, TrackStatus};
pub use state::{CorrectionOutcome, SyncState, MAX_OFFSET_SECONDS};
