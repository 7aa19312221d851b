//! Request context types.
//!
//! The [`RequestContext`] carries the inbound request and the request-scoped
//! state through the action chain and into the terminal handler.

use crate::body::ChunkStream;
use crate::error::StreamError;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use futures_util::Stream;
use http::{HeaderMap, Method, Uri, Version};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use sluice_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The read-only part of the inbound request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// HTTP method.
    pub method: Method,
    /// Request target.
    pub uri: Uri,
    /// Protocol version.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
}

impl From<http::request::Parts> for RequestHead {
    fn from(parts: http::request::Parts) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
        }
    }
}

type StateValue = Arc<dyn Any + Send + Sync>;

/// Per-request context that flows through the action chain.
///
/// `RequestContext` is a cheap handle: cloning it shares the request head and
/// the body, while the request-scoped state map is copied on write. A stage
/// that stores a value passes the updated context on to the next stage, and
/// every later stage sees the value with its concrete type.
///
/// The body is lazy and single-use. Whichever clone reads it first gets the
/// stream; later reads fail with [`StreamError::AlreadyConsumed`].
///
/// # Example
///
/// ```
/// use sluice_core::RequestContext;
///
/// let ctx = RequestContext::builder()
///     .uri("/tests/text")
///     .header("Api-Key", "12345")
///     .build()
///     .unwrap();
///
/// let ctx = ctx.with_value("user", String::from("alice"));
/// assert_eq!(ctx.header("api-key"), Some("12345"));
/// assert_eq!(ctx.value::<String>("user").map(String::as_str), Some("alice"));
/// ```
#[derive(Clone)]
pub struct RequestContext {
    request_id: RequestId,
    head: Arc<RequestHead>,
    state: Arc<HashMap<String, StateValue>>,
    body: Arc<Mutex<Option<ChunkStream>>>,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context around a request head and its body stream.
    pub fn from_parts<S>(head: impl Into<RequestHead>, body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
    {
        Self {
            request_id: RequestId::new(),
            head: Arc::new(head.into()),
            state: Arc::default(),
            body: Arc::new(Mutex::new(Some(body.boxed()))),
            started_at: Instant::now(),
        }
    }

    /// Creates a context for a bodiless `GET /`.
    #[must_use]
    pub fn new() -> Self {
        let head = RequestHead {
            method: Method::GET,
            uri: Uri::from_static("/"),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        };
        Self::from_parts(head, stream::empty())
    }

    /// Starts building a context, mostly useful in tests.
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::new()
    }

    /// Replaces the request ID, e.g. with one propagated by the caller.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the request head.
    #[must_use]
    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    /// Returns all request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Returns the first value of a header. Names are case-insensitive.
    ///
    /// Values that are not visible ASCII are skipped.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_all(name).into_iter().next()
    }

    /// Returns every value of a header, in the order received.
    ///
    /// Values that are not visible ASCII are skipped; read them through
    /// [`headers`](Self::headers).
    #[must_use]
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.head
            .headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// Returns a context that also holds `value` under `key`.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.set_value(key, value);
        self
    }

    /// Stores `value` under `key`, replacing any earlier value.
    ///
    /// Other clones of this context keep their own view of the state.
    pub fn set_value<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        Arc::make_mut(&mut self.state).insert(key.into(), Arc::new(value));
    }

    /// Returns the value stored under `key`, if present and of type `T`.
    #[must_use]
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.state.get(key)?.downcast_ref::<T>()
    }

    /// Returns `true` if a value is stored under `key`.
    #[must_use]
    pub fn contains_value(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    /// Takes the inbound body stream.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlreadyConsumed`] if the body was taken before.
    pub fn body_stream(&self) -> Result<ChunkStream, StreamError> {
        self.body.lock().take().ok_or(StreamError::AlreadyConsumed)
    }

    /// Takes the inbound body and collects it into memory.
    pub async fn body_bytes(&self) -> Result<Bytes, StreamError> {
        let mut stream = self.body_stream()?;
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }

    /// Returns when the request entered the pipeline.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request entered the pipeline.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("state_keys", &self.state.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug)]
pub struct RequestContextBuilder {
    inner: http::request::Builder,
    body: Bytes,
}

impl RequestContextBuilder {
    fn new() -> Self {
        Self {
            inner: http::Request::builder(),
            body: Bytes::new(),
        }
    }

    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.inner = self.inner.method(method);
        self
    }

    /// Sets the request target.
    #[must_use]
    pub fn uri(mut self, uri: &str) -> Self {
        self.inner = self.inner.uri(uri);
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the context.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI, a header name or a header value is invalid.
    pub fn build(self) -> Result<RequestContext, http::Error> {
        let (parts, ()) = self.inner.body(())?.into_parts();
        let body = self.body;
        let stream: ChunkStream = if body.is_empty() {
            stream::empty().boxed()
        } else {
            stream::once(async move { Ok(body) }).boxed()
        };
        Ok(RequestContext::from_parts(parts, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2, "Each RequestId should be unique");
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).expect("serialization should work");
        let parsed: RequestId = serde_json::from_str(&json).expect("deserialization should work");
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_headers_are_case_insensitive_and_multi_valued() {
        let ctx = RequestContext::builder()
            .header("Accept", "text/html")
            .header("accept", "application/json")
            .build()
            .unwrap();

        assert_eq!(ctx.header("ACCEPT"), Some("text/html"));
        assert_eq!(ctx.header_all("Accept"), vec!["text/html", "application/json"]);
        assert!(ctx.header("Api-Key").is_none());
    }

    #[test]
    fn test_invalid_header_fails_build() {
        assert!(RequestContext::builder().header("bad header", "x").build().is_err());
    }

    #[test]
    fn test_values_are_typed() {
        let start = StdInstant::now();
        let ctx = RequestContext::new()
            .with_value("start", start)
            .with_value("count", 3_u32);

        assert_eq!(ctx.value::<StdInstant>("start"), Some(&start));
        assert_eq!(ctx.value::<u32>("count"), Some(&3));
        assert!(ctx.value::<String>("count").is_none());
        assert!(ctx.value::<u32>("missing").is_none());
    }

    #[test]
    fn test_state_is_copied_on_write() {
        let original = RequestContext::new().with_value("k", 1_i32);
        let updated = original.clone().with_value("k", 2_i32);

        assert_eq!(original.value::<i32>("k"), Some(&1));
        assert_eq!(updated.value::<i32>("k"), Some(&2));
        assert_eq!(original.request_id(), updated.request_id());
    }

    #[tokio::test]
    async fn test_body_is_single_use_across_clones() {
        let ctx = RequestContext::builder()
            .method(Method::POST)
            .uri("/tests/post")
            .body("payload")
            .build()
            .unwrap();
        let other = ctx.clone();

        assert_eq!(ctx.body_bytes().await.unwrap(), Bytes::from_static(b"payload"));
        assert!(matches!(other.body_bytes().await, Err(StreamError::AlreadyConsumed)));
    }

    #[test]
    fn test_elapsed_grows() {
        let ctx = RequestContext::new();
        std::thread::sleep(Duration::from_millis(10));
        assert!(ctx.elapsed() >= Duration::from_millis(10));
    }
}
