//! Shared fixtures for core-sync integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{MediaTrack, PlaybackError, PlaybackResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct TrackInner {
    loaded: bool,
    position: Duration,
    duration: Duration,
    playing: bool,
    seeks: Vec<Duration>,
}

/// Media track whose clock only moves when a test moves it.
#[derive(Debug, Default)]
pub struct FakeTrack {
    inner: Mutex<TrackInner>,
}

impl FakeTrack {
    /// A loaded, paused track of the given length in seconds.
    pub fn loaded(length: f64) -> Self {
        let track = Self::default();
        {
            let mut inner = track.inner.lock().unwrap();
            inner.loaded = true;
            inner.duration = Duration::from_secs_f64(length);
        }
        track
    }

    pub fn set_position(&self, seconds: f64) {
        self.inner.lock().unwrap().position = Duration::from_secs_f64(seconds);
    }

    pub fn current_position(&self) -> Duration {
        self.inner.lock().unwrap().position
    }

    pub fn playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.inner.lock().unwrap().seeks.clone()
    }

    fn ready(&self) -> PlaybackResult<std::sync::MutexGuard<'_, TrackInner>> {
        let inner = self.inner.lock().unwrap();
        if inner.loaded {
            Ok(inner)
        } else {
            Err(PlaybackError::NotReady("no source".to_string()))
        }
    }
}

#[async_trait]
impl MediaTrack for FakeTrack {
    async fn play(&self) -> PlaybackResult<()> {
        self.ready()?.playing = true;
        Ok(())
    }

    async fn pause(&self) -> PlaybackResult<()> {
        self.ready()?.playing = false;
        Ok(())
    }

    async fn stop(&self) -> PlaybackResult<()> {
        let mut inner = self.ready()?;
        inner.playing = false;
        inner.position = Duration::ZERO;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> PlaybackResult<()> {
        let mut inner = self.ready()?;
        inner.position = position;
        inner.seeks.push(position);
        Ok(())
    }

    async fn position(&self) -> PlaybackResult<Duration> {
        Ok(self.ready()?.position)
    }

    async fn duration(&self) -> PlaybackResult<Duration> {
        Ok(self.ready()?.duration)
    }

    async fn is_playing(&self) -> PlaybackResult<bool> {
        Ok(self.ready()?.playing)
    }
}

/// Write `contents` to `dir/name` and return the path.
pub fn media_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents).unwrap();
    path
}
