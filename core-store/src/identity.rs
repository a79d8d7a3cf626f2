//! # Content Identity
//!
//! Media files are recognised by what they contain rather than by their
//! name: the identity of a file is the SHA-256 digest of its leading bytes,
//! rendered as 64 lowercase hex characters. Two files with the same sampled
//! prefix share an identity, so a renamed or copied file still finds its
//! stored offsets.
//!
//! Only the first `sample_size` bytes are read, which keeps hashing a
//! multi-gigabyte video cheap.

use crate::error::IdentityError;
use core_runtime::config::DEFAULT_HASH_SAMPLE_SIZE;
use core_runtime::logging::strip_path;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

const DIGEST_HEX_LEN: usize = 64;
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest of a media file's leading bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIdentity(String);

impl ContentIdentity {
    /// Parse a stored identity, accepting only 64 lowercase hex characters.
    pub fn from_hex(value: &str) -> Result<Self, IdentityError> {
        let well_formed = value.len() == DIGEST_HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        if well_formed {
            Ok(Self(value.to_string()))
        } else {
            Err(IdentityError::InvalidDigest(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines and compact displays.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes content identities from files or in-memory buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHasher {
    sample_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_SAMPLE_SIZE)
    }
}

impl ContentHasher {
    pub fn new(sample_size: usize) -> Self {
        Self { sample_size }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Identity of `data`, truncated to the sample size.
    pub fn hash_bytes(&self, data: &[u8]) -> ContentIdentity {
        let sample = &data[..data.len().min(self.sample_size)];
        let mut hasher = Sha256::new();
        hasher.update(sample);
        ContentIdentity(format!("{:x}", hasher.finalize()))
    }

    /// Identity of the file at `path`, reading at most `sample_size` bytes.
    ///
    /// Files shorter than the sample are hashed in full. Any read failure
    /// yields an error; a partial digest is never returned.
    #[instrument(skip_all)]
    pub async fn hash_file(&self, path: impl AsRef<Path>) -> Result<ContentIdentity, IdentityError> {
        let path = path.as_ref();
        let file_name = path.to_string_lossy();
        let io_error = |source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let mut reader = file.take(self.sample_size as u64);

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_CHUNK_SIZE.min(self.sample_size.max(1))];
        let mut total = 0usize;

        loop {
            let read = reader.read(&mut buffer).await.map_err(io_error)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            total += read;
        }

        let identity = ContentIdentity(format!("{:x}", hasher.finalize()));
        debug!(
            file = strip_path(&file_name),
            bytes = total,
            identity = identity.short(),
            "Hashed media file"
        );
        Ok(identity)
    }
}
