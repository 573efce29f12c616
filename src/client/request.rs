//! Request construction and body replay.
//!
//! # Responsibilities
//! - Describe one logical call: method, target, headers, body, deadline
//! - Make the body replayable so every attempt sends identical bytes
//! - Resolve relative paths against the selected base URL
//!
//! # Design Decisions
//! - Bodies are materialized into memory once; retrying a large streaming
//!   body is explicitly unsupported in exchange for byte-identical replays
//! - An absolute target URL pins the call to that host; no endpoint is
//!   substituted and no rebalancing happens for its lifetime
//! - Caller headers always win over client defaults

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

use crate::error::ClientError;

/// A replayable request body.
///
/// Byte-backed bodies replay for free. Stream-backed bodies are drained into
/// memory on the first snapshot; later snapshots hand out the same buffer.
pub struct Body(BodyInner);

enum BodyInner {
    Buffered(Bytes),
    Stream(Pin<Box<dyn AsyncRead + Send + Sync>>),
}

impl Body {
    /// Body backed by a byte buffer.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self(BodyInner::Buffered(data.into()))
    }

    /// Body backed by an async reader, drained into memory on first use.
    pub fn from_reader(reader: impl AsyncRead + Send + Sync + 'static) -> Self {
        Self(BodyInner::Stream(Box::pin(reader)))
    }

    /// Return the full body bytes, buffering a stream on first call.
    pub(crate) async fn snapshot(&mut self) -> Result<Bytes, std::io::Error> {
        match &mut self.0 {
            BodyInner::Buffered(data) => Ok(data.clone()),
            BodyInner::Stream(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                let data = Bytes::from(buf);
                self.0 = BodyInner::Buffered(data.clone());
                Ok(data)
            }
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            BodyInner::Buffered(data) => write!(f, "Body::Buffered({} bytes)", data.len()),
            BodyInner::Stream(_) => write!(f, "Body::Stream"),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Self::bytes(data)
    }
}

impl From<String> for Body {
    fn from(data: String) -> Self {
        Self::bytes(data)
    }
}

impl From<&'static str> for Body {
    fn from(data: &'static str) -> Self {
        Self::bytes(data)
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        Self::bytes(data)
    }
}

/// Where a request is going: a path resolved against a balanced endpoint, or
/// a fully-qualified URL that bypasses selection entirely.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Relative(String),
    Absolute(Url),
}

/// One logical call, possibly dispatched as several attempts.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) target: Target,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Body>,
    pub(crate) timeout: Option<Duration>,
}

impl Request {
    /// Build a request for `target`, which is either a relative path
    /// (`"/v1/items?page=2"`) or an absolute URL.
    pub fn new(method: Method, target: &str) -> Self {
        let target = match Url::parse(target) {
            Ok(url) => Target::Absolute(url),
            Err(_) => Target::Relative(target.to_string()),
        };
        Self {
            method,
            target,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Set a header, replacing any previous value for the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach a JSON-encoded body and set `Content-Type: application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, ClientError> {
        let encoded = serde_json::to_vec(value).map_err(ClientError::Encode)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Body::bytes(encoded));
        Ok(self)
    }

    /// Override the client's default per-call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Resolve a relative path-and-query against a base URL, preserving the
/// query string exactly.
pub(crate) fn resolve_target(base: &Url, path: &str) -> Result<Url, ClientError> {
    base.join(path).map_err(ClientError::from)
}

/// Merge client default headers into request headers without overriding
/// anything the caller set.
pub(crate) fn merge_default_headers(headers: &mut HeaderMap, defaults: &HeaderMap) {
    for (name, value) in defaults {
        if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::USER_AGENT;

    #[tokio::test]
    async fn test_buffered_body_snapshots_are_identical() {
        let mut body = Body::bytes(vec![1u8, 2, 3, 4]);
        let first = body.snapshot().await.unwrap();
        let second = body.snapshot().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stream_body_is_drained_once() {
        let reader = std::io::Cursor::new(b"payload".to_vec());
        let mut body = Body::from_reader(reader);
        let first = body.snapshot().await.unwrap();
        assert_eq!(&first[..], b"payload");

        // The stream is gone; the buffer answers from now on.
        let second = body.snapshot().await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_target_classification() {
        let relative = Request::new(Method::GET, "/v1/items?page=2");
        assert!(matches!(relative.target, Target::Relative(_)));

        let absolute = Request::new(Method::GET, "https://pinned.example.com/v1/items");
        assert!(matches!(absolute.target, Target::Absolute(_)));
    }

    #[test]
    fn test_resolve_preserves_query() {
        let base = Url::parse("http://a:8080/api/").unwrap();
        let resolved = resolve_target(&base, "/v1/items?page=2&q=x%20y").unwrap();
        assert_eq!(resolved.path(), "/v1/items");
        assert_eq!(resolved.query(), Some("page=2&q=x%20y"));
    }

    #[test]
    fn test_caller_headers_win_over_defaults() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("custom/1.0"));

        let mut defaults = HeaderMap::new();
        defaults.insert(USER_AGENT, HeaderValue::from_static("default/1.0"));
        defaults.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        merge_default_headers(&mut headers, &defaults);
        assert_eq!(headers.get(USER_AGENT).unwrap(), "custom/1.0");
        assert_eq!(
            headers.get(reqwest::header::ACCEPT).unwrap(),
            "application/json"
        );
    }
}
