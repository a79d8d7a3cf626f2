//! # Host Bridge Traits
//!
//! Collaborator contracts that the host application implements for the sync
//! engine.
//!
//! ## Overview
//!
//! The engine never decodes or renders media and never opens sockets itself.
//! It drives two media tracks and talks to an optional remote offset service
//! through the traits defined here:
//!
//! - [`MediaTrack`](playback::MediaTrack) - one decoded timeline (the primary
//!   video or the secondary riff audio) with transport and seek controls
//! - [`HttpClient`](http::HttpClient) - minimal async HTTP used by the remote
//!   offset store and its connectivity probe
//!
//! ## Error Handling
//!
//! Track operations return [`PlaybackError`](playback::PlaybackError). A track
//! with no loaded source is an expected condition (the engine treats it as
//! "not ready"), so hosts should map "nothing loaded" to
//! [`PlaybackError::NotReady`](playback::PlaybackError::NotReady) rather than
//! a generic failure.
//!
//! Transport-level failures use [`BridgeError`](error::BridgeError).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so handles can be shared between
//! the engine's timer task and host callbacks.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::playback::{MediaTrack, PlaybackResult};
//! use async_trait::async_trait;
//! use std::time::Duration;
//!
//! struct GstTrack { /* pipeline handle */ }
//!
//! #[async_trait]
//! impl MediaTrack for GstTrack {
//!     async fn seek(&self, position: Duration) -> PlaybackResult<()> {
//!         // Implementation
//!         todo!()
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod http;
pub mod playback;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use playback::{MediaTrack, PlaybackError, PlaybackResult, TrackRole};
