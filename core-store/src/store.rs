//! Offset store contract shared by the local and remote backends.

use crate::error::Result;
use crate::identity::ContentIdentity;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Which backend an offset store talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StoreBackend {
    Local,
    Remote,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Local => write!(f, "local"),
            StoreBackend::Remote => write!(f, "remote"),
        }
    }
}

/// A stored offset with the file names last seen for its identities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredOffset {
    pub video: ContentIdentity,
    pub audio: ContentIdentity,
    pub offset_seconds: f64,
    /// Unix seconds of the last write
    pub updated_at: i64,
    pub video_name: Option<String>,
    pub audio_name: Option<String>,
}

/// Persistent mapping from a (video, audio) identity pair to an offset.
///
/// Offsets are signed seconds: the position of the audio track minus the
/// position of the video track.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    /// Offset recorded for the pair, `Ok(None)` when there is none.
    async fn get_offset(
        &self,
        video: &ContentIdentity,
        audio: &ContentIdentity,
    ) -> Result<Option<f64>>;

    /// Insert or replace the offset for the pair. Durable once this returns.
    async fn put_offset(
        &self,
        video: &ContentIdentity,
        audio: &ContentIdentity,
        offset_seconds: f64,
    ) -> Result<()>;

    /// Record the last file name seen for an identity. Diagnostics only.
    async fn remember_file(&self, identity: &ContentIdentity, display_name: &str) -> Result<()>;

    fn backend(&self) -> StoreBackend;
}
