//! # Remote Offset Store
//!
//! [`OffsetStore`] backed by the shared offset service, so offsets found by
//! one viewer are available to everyone watching the same files.
//!
//! ## Protocol
//!
//! - Lookup: `GET {url}?video_hash=<id>&audio_hash=<id>`. An empty body or a
//!   404 means no offset is known; otherwise the body is the offset in
//!   seconds as a decimal number.
//! - Store: `POST {url}` with the form fields `video_hash`, `audio_hash` and
//!   `offset`. Any 2xx status is success.
//!
//! Every request is bounded by the configured timeout.

use crate::error::{Result, StoreError};
use crate::identity::ContentIdentity;
use crate::store::{OffsetStore, StoreBackend};
use async_trait::async_trait;
use bridge_traits::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Offset store talking to the shared offset service over HTTP.
pub struct RemoteOffsetStore {
    http: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
}

impl RemoteOffsetStore {
    pub fn new(http: Arc<dyn HttpClient>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn lookup_url(&self, video: &ContentIdentity, audio: &ContentIdentity) -> String {
        format!(
            "{}?video_hash={}&audio_hash={}",
            self.url,
            urlencoding::encode(video.as_str()),
            urlencoding::encode(audio.as_str())
        )
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = request.timeout(self.timeout);
        match tokio::time::timeout(self.timeout, self.http.execute(request)).await {
            Ok(response) => Ok(response?),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    fn parse_offset(body: &str) -> Result<Option<f64>> {
        let body = body.trim();
        if body.is_empty() {
            return Ok(None);
        }

        match body.parse::<f64>() {
            Ok(offset) if offset.is_finite() => Ok(Some(offset)),
            _ => Err(StoreError::Malformed(format!(
                "Remote offset is not a number: '{}'",
                body
            ))),
        }
    }
}

#[async_trait]
impl OffsetStore for RemoteOffsetStore {
    #[instrument(skip(self), fields(video = video.short(), audio = audio.short()))]
    async fn get_offset(
        &self,
        video: &ContentIdentity,
        audio: &ContentIdentity,
    ) -> Result<Option<f64>> {
        let request = HttpRequest::new(HttpMethod::Get, self.lookup_url(video, audio));
        let response = self.send(request).await?;

        if response.is_not_found() {
            debug!("Remote store has no offset for this pair");
            return Ok(None);
        }

        if !response.is_success() {
            warn!(status = response.status, "Remote offset lookup failed");
            return Err(StoreError::Remote(format!(
                "Lookup returned HTTP {}",
                response.status
            )));
        }

        let body = response
            .text()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        let offset = Self::parse_offset(&body)?;

        debug!(found = offset.is_some(), "Looked up remote offset");
        Ok(offset)
    }

    #[instrument(skip(self), fields(video = video.short(), audio = audio.short()))]
    async fn put_offset(
        &self,
        video: &ContentIdentity,
        audio: &ContentIdentity,
        offset_seconds: f64,
    ) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, self.url.clone()).form(&[
            ("video_hash", urlencoding::encode(video.as_str()).into_owned()),
            ("audio_hash", urlencoding::encode(audio.as_str()).into_owned()),
            ("offset", offset_seconds.to_string()),
        ]);

        let response = self.send(request).await?;

        if !response.is_success() {
            warn!(status = response.status, "Remote offset store rejected the write");
            return Err(StoreError::Remote(format!(
                "Store returned HTTP {}",
                response.status
            )));
        }

        debug!(offset_seconds, "Stored remote offset");
        Ok(())
    }

    async fn remember_file(&self, _identity: &ContentIdentity, _display_name: &str) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &'static str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn identities() -> (ContentIdentity, ContentIdentity) {
        let hasher = crate::identity::ContentHasher::default();
        (hasher.hash_bytes(b"V1"), hasher.hash_bytes(b"A1"))
    }

    fn store(mock: MockHttp) -> RemoteOffsetStore {
        RemoteOffsetStore::new(Arc::new(mock), "http://riffs.test/db", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_get_parses_body() {
        let (video, audio) = identities();
        let expected_url = format!(
            "http://riffs.test/db?video_hash={}&audio_hash={}",
            video, audio
        );

        let mut mock = MockHttp::new();
        mock.expect_execute()
            .withf(move |req| req.method == HttpMethod::Get && req.url == expected_url)
            .times(1)
            .returning(|_| Ok(response(200, "2.5\n")));

        assert_eq!(store(mock).get_offset(&video, &audio).await.unwrap(), Some(2.5));
    }

    #[tokio::test]
    async fn test_get_negative_offset() {
        let (video, audio) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Ok(response(200, "-0.75")));

        assert_eq!(store(mock).get_offset(&video, &audio).await.unwrap(), Some(-0.75));
    }

    #[tokio::test]
    async fn test_empty_body_is_none() {
        let (video, audio) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute().returning(|_| Ok(response(200, "")));

        assert_eq!(store(mock).get_offset(&video, &audio).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let (video, audio) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute().returning(|_| Ok(response(404, "not here")));

        assert_eq!(store(mock).get_offset(&video, &audio).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let (video, audio) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Ok(response(200, "<html>oops</html>")));

        let err = store(mock).get_offset(&video, &audio).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_remote_error() {
        let (video, audio) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute().returning(|_| Ok(response(500, "")));

        let err = store(mock).get_offset(&video, &audio).await.unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
    }

    #[tokio::test]
    async fn test_put_posts_form() {
        let (video, audio) = identities();
        let expected_body = format!("video_hash={}&audio_hash={}&offset=2.5", video, audio);

        let mut mock = MockHttp::new();
        mock.expect_execute()
            .withf(move |req| {
                req.method == HttpMethod::Post
                    && req.url == "http://riffs.test/db"
                    && req.body.as_deref() == Some(expected_body.as_bytes())
                    && req.timeout == Some(Duration::from_secs(5))
            })
            .times(1)
            .returning(|_| Ok(response(200, "")));

        store(mock).put_offset(&video, &audio, 2.5).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_rejected() {
        let (video, audio) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute().returning(|_| Ok(response(403, "")));

        let err = store(mock).put_offset(&video, &audio, 1.0).await.unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
    }

    #[tokio::test]
    async fn test_connection_error_is_remote_error() {
        let (video, audio) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Connection("refused".to_string())));

        let err = store(mock).get_offset(&video, &audio).await.unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
    }

    #[tokio::test]
    async fn test_client_timeout_is_timeout() {
        let (video, audio) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout(Duration::from_secs(5))));

        let err = store(mock).put_offset(&video, &audio, 1.0).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_remember_file_is_noop() {
        let (video, _) = identities();
        let mut mock = MockHttp::new();
        mock.expect_execute().times(0);

        let remote = store(mock);
        remote.remember_file(&video, "film.mkv").await.unwrap();
        assert_eq!(remote.backend(), StoreBackend::Remote);
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(RemoteOffsetStore::parse_offset(" 12.0 ").unwrap(), Some(12.0));
        assert_eq!(RemoteOffsetStore::parse_offset("\n").unwrap(), None);
        assert!(RemoteOffsetStore::parse_offset("NaN").is_err());
        assert!(RemoteOffsetStore::parse_offset("inf").is_err());
    }
}
