//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, used by the remote offset store and its
//!   startup connectivity probe
//!
//! Media tracks are not provided here: they wrap whatever player the host UI
//! embeds and are implemented next to that UI.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let http_client = Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(5))?);
//! // Hand to core_store::open_offset_store
//! ```

mod http;

pub use http::ReqwestHttpClient;
