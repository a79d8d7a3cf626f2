//! # Offset Store
//!
//! Content identities for media files and the persistent offset store keyed
//! by them.
//!
//! ## Overview
//!
//! - [`ContentHasher`] turns a file's leading bytes into a [`ContentIdentity`]
//! - [`OffsetStore`] maps a (video, audio) identity pair to an offset in seconds
//! - [`SqliteOffsetStore`] keeps offsets in a local SQLite database
//! - [`RemoteOffsetStore`] shares offsets through an HTTP service
//! - [`open_offset_store`] picks a backend once per session
//!
//! ## Usage
//!
//! ```ignore
//! use core_store::{open_offset_store, ContentHasher};
//!
//! let store = open_offset_store(&config.store_config(), config.http_client.clone()).await?;
//! let hasher = ContentHasher::default();
//! let video = hasher.hash_file("film.mkv").await?;
//! let audio = hasher.hash_file("riff.mp3").await?;
//! let offset = store.get_offset(&video, &audio).await?;
//! ```

pub mod db;
pub mod error;
pub mod identity;
pub mod local;
pub mod remote;
pub mod selection;
pub mod store;

pub use error::{IdentityError, Result, StoreError};
pub use identity::{ContentHasher, ContentIdentity};
pub use local::SqliteOffsetStore;
pub use remote::RemoteOffsetStore;
pub use selection::open_offset_store;
pub use store::{OffsetStore, StoreBackend, StoredOffset};
