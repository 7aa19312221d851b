//! The immutable response descriptor.
//!
//! A [`Reply`] never changes after construction. Every `with_*` operation and
//! every body helper copies the reply and returns the copy, leaving the
//! receiver untouched:
//!
//! ```
//! use sluice_core::Reply;
//!
//! let base = Reply::ok();
//! let tagged = base.with_header("X-Trace", "abc");
//!
//! assert!(base.header("x-trace").is_none());
//! assert_eq!(tagged.header("X-Trace"), Some("abc"));
//! ```
//!
//! Each body gets its own [`MaterializedCell`]: copies made by `with_header`,
//! `with_status`, `with_cookie` or `as_content_type` share the cell of the
//! reply they came from, while `with_body` and every body helper start a
//! fresh one. The serving layer resolves the cell once, when it starts
//! draining the body.

use crate::body::Body;
use crate::cookie::Cookie;
use crate::error::{MaterializeError, ReplyError, StreamError};
use crate::materialized::{Materialized, MaterializedCell};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http::StatusCode;
use indexmap::IndexMap;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Content type of replies that never set one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Renders named templates for [`Reply::template`].
///
/// Sluice ships no template engine; applications plug theirs in here.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `name` with `params`.
    fn render(&self, name: &str, params: &serde_json::Value) -> anyhow::Result<String>;
}

/// An HTTP response description: status, headers, cookies, content type,
/// a body and the materialized-value side channel.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: IndexMap<String, Vec<String>>,
    cookies: Vec<Cookie>,
    content_type: String,
    body: Body,
    materialized: MaterializedCell,
}

/// The pieces of a [`Reply`], taken apart by the serving layer.
#[derive(Debug)]
pub struct ReplyParts {
    /// Response status.
    pub status: StatusCode,
    /// Header names (lowercase) with their values in insertion order.
    pub headers: IndexMap<String, Vec<String>>,
    /// Cookies to set.
    pub cookies: Vec<Cookie>,
    /// Declared content type.
    pub content_type: String,
    /// The body blueprint.
    pub body: Body,
    /// The side channel to resolve when draining starts.
    pub materialized: MaterializedCell,
}

impl Reply {
    /// Creates an empty `text/plain` reply with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: IndexMap::new(),
            cookies: Vec::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: Body::empty(),
            materialized: MaterializedCell::new(),
        }
    }

    /// Same as [`Reply::new`].
    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        Self::new(status)
    }

    /// 200 OK.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// 201 Created.
    #[must_use]
    pub fn created() -> Self {
        Self::new(StatusCode::CREATED)
    }

    /// 204 No Content.
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// 429 Too Many Requests.
    #[must_use]
    pub fn too_many_requests() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS)
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    // --- accessors ---

    /// The status code.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// All headers, keyed by lowercase name.
    #[must_use]
    pub const fn headers(&self) -> &IndexMap<String, Vec<String>> {
        &self.headers
    }

    /// The first value of a header. Names are case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_all(name).first().map(String::as_str)
    }

    /// Every value of a header, in insertion order.
    #[must_use]
    pub fn header_all(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map_or(&[][..], Vec::as_slice)
    }

    /// The cookies to set.
    #[must_use]
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// The declared content type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// The materialized-value cell of this reply's body.
    #[must_use]
    pub const fn materialized_cell(&self) -> &MaterializedCell {
        &self.materialized
    }

    /// Resolves once the serving layer has started draining the body.
    ///
    /// Fails with [`MaterializeError::Abandoned`] if every copy of the reply
    /// is dropped without being served.
    pub fn materialized_value(
        &self,
    ) -> impl Future<Output = Result<Materialized, MaterializeError>> + Send + 'static {
        self.materialized.wait()
    }

    /// Like [`Reply::materialized_value`], downcast to `T`.
    pub fn materialized_value_as<T: Any + Send + Sync>(
        &self,
    ) -> impl Future<Output = Result<Arc<T>, MaterializeError>> + Send + 'static {
        self.materialized.wait_as::<T>()
    }

    /// Takes the reply apart.
    #[must_use]
    pub fn into_parts(self) -> ReplyParts {
        ReplyParts {
            status: self.status,
            headers: self.headers,
            cookies: self.cookies,
            content_type: self.content_type,
            body: self.body,
            materialized: self.materialized,
        }
    }

    // --- functional updates ---

    /// Returns a copy with `value` appended to the values of header `name`.
    #[must_use]
    pub fn with_header(&self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.headers
            .entry(name.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
        next
    }

    /// Returns a copy with another status.
    #[must_use]
    pub fn with_status(&self, status: StatusCode) -> Self {
        let mut next = self.clone();
        next.status = status;
        next
    }

    /// Returns a copy that also sets `cookie`.
    ///
    /// An earlier cookie with the same name, path and domain is replaced.
    #[must_use]
    pub fn with_cookie(&self, cookie: Cookie) -> Self {
        let mut next = self.clone();
        next.cookies.retain(|existing| !existing.same_entry(&cookie));
        next.cookies.push(cookie);
        next
    }

    /// Returns a copy with another body. The content type is kept.
    ///
    /// The copy gets a new materialized-value cell; waiters on the receiver's
    /// cell are not woken by serving the copy.
    #[must_use]
    pub fn with_body(&self, body: Body) -> Self {
        let mut next = self.clone();
        next.body = body;
        next.materialized = MaterializedCell::new();
        next
    }

    /// Returns a copy with another content type.
    #[must_use]
    pub fn as_content_type(&self, content_type: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.content_type = content_type.into();
        next
    }

    fn with_body_as(&self, body: Body, content_type: &str) -> Self {
        let mut next = self.with_body(body);
        next.content_type = content_type.to_string();
        next
    }

    // --- body helpers ---

    /// A UTF-8 text body, `text/plain`.
    #[must_use]
    pub fn text(&self, text: impl Into<String>) -> Self {
        self.with_body_as(Body::full(text.into()), "text/plain")
    }

    /// An HTML body, `text/html`.
    #[must_use]
    pub fn html(&self, html: impl Into<String>) -> Self {
        self.with_body_as(Body::full(html.into()), "text/html")
    }

    /// An XML document, `application/xml`.
    #[must_use]
    pub fn xml(&self, xml: impl Into<String>) -> Self {
        self.with_body_as(Body::full(xml.into()), "application/xml")
    }

    /// A pre-serialized JSON document, `application/json`.
    #[must_use]
    pub fn json_str(&self, json: impl Into<String>) -> Self {
        self.with_body_as(Body::full(json.into()), "application/json")
    }

    /// A JSON value, `application/json`.
    #[must_use]
    pub fn json_value(&self, json: &serde_json::Value) -> Self {
        self.json_str(json.to_string())
    }

    /// Any serializable value as JSON, `application/json`.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<Self, ReplyError> {
        let bytes = serde_json::to_vec(value)?;
        Ok(self.with_body_as(Body::full(bytes), "application/json"))
    }

    /// A bounded buffer emitted in 8 KiB chunks, `application/octet-stream`.
    #[must_use]
    pub fn binary(&self, bytes: impl Into<Bytes>) -> Self {
        self.with_body_as(Body::buffered(bytes), "application/octet-stream")
    }

    /// Forwards an existing chunk stream, `application/octet-stream`.
    #[must_use]
    pub fn binary_stream<S>(&self, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
    {
        self.with_body_as(Body::from_stream(stream), "application/octet-stream")
    }

    /// Reads the body from an async reader, `application/octet-stream`.
    #[must_use]
    pub fn binary_reader<R>(&self, reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        self.with_body_as(Body::from_reader(reader), "application/octet-stream")
    }

    /// Streams a file. The content type is kept.
    #[must_use]
    pub fn send_file(&self, path: impl Into<PathBuf>) -> Self {
        self.with_body(Body::file(path))
    }

    /// A chunked body. The content type is kept.
    #[must_use]
    pub fn chunked<S>(&self, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
    {
        self.with_body(Body::from_stream(stream))
    }

    /// A stream of strings encoded as UTF-8. The content type is kept.
    #[must_use]
    pub fn stream<S>(&self, stream: S) -> Self
    where
        S: Stream<Item = String> + Send + 'static,
    {
        self.with_body(Body::from_stream(stream.map(|s| Ok(Bytes::from(s)))))
    }

    /// Renders a template into an HTML body.
    pub fn template(
        &self,
        renderer: &dyn TemplateRenderer,
        name: &str,
        params: &serde_json::Value,
    ) -> Result<Self, ReplyError> {
        let html = renderer
            .render(name, params)
            .map_err(|err| ReplyError::Template {
                name: name.to_string(),
                message: format!("{err:#}"),
            })?;
        Ok(self.html(html))
    }
}

impl Default for Reply {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use proptest::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_text_sets_body_and_content_type() {
        let reply = Reply::ok().text("Hello World!\n");
        assert_eq!(reply.status_code(), StatusCode::OK);
        assert_eq!(reply.content_type(), "text/plain");
        assert_eq!(reply.body().collect().await.unwrap(), "Hello World!\n");
    }

    #[test]
    fn test_default_content_type() {
        assert_eq!(Reply::not_found().content_type(), DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let reply = Reply::bad_request().json(&json!({"error": "Bad API KEY"})).unwrap();
        assert_eq!(reply.content_type(), "application/json");
        assert_eq!(reply.status_code(), StatusCode::BAD_REQUEST);
        let body = reply.body().collect().await.unwrap();
        assert_eq!(body, r#"{"error":"Bad API KEY"}"#);

        let raw = Reply::ok().json_str("[1,2]");
        assert_eq!(raw.body().collect().await.unwrap(), "[1,2]");
    }

    #[test]
    fn test_with_header_appends_in_order() {
        let reply = Reply::ok()
            .with_header("Vary", "Accept")
            .with_header("vary", "Origin")
            .with_header("X-One", "1");

        assert_eq!(reply.header_all("VARY"), ["Accept", "Origin"]);
        let names: Vec<_> = reply.headers().keys().cloned().collect();
        assert_eq!(names, ["vary", "x-one"]);
    }

    #[test]
    fn test_with_cookie_replaces_same_entry() {
        let reply = Reply::ok()
            .with_cookie(Cookie::new("theme", "dark").path("/"))
            .with_cookie(Cookie::new("lang", "fr"))
            .with_cookie(Cookie::new("theme", "light").path("/"));

        let values: Vec<_> = reply.cookies().iter().map(|c| (c.name(), c.value())).collect();
        assert_eq!(values, [("lang", "fr"), ("theme", "light")]);
    }

    #[tokio::test]
    async fn test_binary_is_chunked_by_8k() {
        let reply = Reply::ok().binary(vec![7_u8; 20_000]);
        assert_eq!(reply.content_type(), "application/octet-stream");

        let sizes: Vec<usize> = reply
            .body()
            .materialize()
            .stream
            .map(|chunk| chunk.unwrap().len())
            .collect()
            .await;
        assert_eq!(sizes, [8192, 8192, 3616]);
    }

    #[tokio::test]
    async fn test_chunked_and_stream_keep_content_type() {
        let base = Reply::ok().as_content_type("text/event-stream");

        let chunked = base.chunked(stream::iter(vec![Ok(Bytes::from_static(b"a"))]));
        assert_eq!(chunked.content_type(), "text/event-stream");

        let strings = base.stream(stream::iter(vec!["x".to_string(), "y".to_string()]));
        assert_eq!(strings.content_type(), "text/event-stream");
        assert_eq!(strings.body().collect().await.unwrap(), "xy");
    }

    #[tokio::test]
    async fn test_send_file_streams_lazily() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file contents").unwrap();

        let reply = Reply::ok().as_content_type("text/csv").send_file(file.path());
        assert_eq!(reply.content_type(), "text/csv");
        assert_eq!(reply.body().collect().await.unwrap(), "file contents");
    }

    struct Echo;

    impl TemplateRenderer for Echo {
        fn render(&self, name: &str, params: &serde_json::Value) -> anyhow::Result<String> {
            if name == "missing" {
                anyhow::bail!("no such template");
            }
            Ok(format!("<p>{name}:{}</p>", params["who"].as_str().unwrap_or_default()))
        }
    }

    #[tokio::test]
    async fn test_template_renders_html() {
        let reply = Reply::ok().template(&Echo, "hello", &json!({"who": "bob"})).unwrap();
        assert_eq!(reply.content_type(), "text/html");
        assert_eq!(reply.body().collect().await.unwrap(), "<p>hello:bob</p>");

        let err = Reply::ok().template(&Echo, "missing", &json!({})).unwrap_err();
        assert!(matches!(err, ReplyError::Template { ref name, .. } if name == "missing"));
    }

    #[tokio::test]
    async fn test_metadata_copies_share_materialized_value() {
        let original = Reply::ok().text("body");
        let copy = original
            .with_status(StatusCode::ACCEPTED)
            .with_header("X-Trace", "a")
            .as_content_type("text/csv");
        let waiting = original.materialized_value_as::<u8>();

        copy.materialized_cell()
            .complete(Materialized::value(9_u8))
            .unwrap();
        assert_eq!(*waiting.await.unwrap(), 9);
        assert!(original.materialized_cell().is_resolved());
    }

    #[test]
    fn test_body_replacement_starts_a_new_cell() {
        let base = Reply::ok().as_content_type("text/event-stream");
        let first = base.text("one");
        let second = base.with_body(Body::full("two"));

        first
            .materialized_cell()
            .complete(Materialized::value(1_u8))
            .unwrap();

        assert!(!base.materialized_cell().is_resolved());
        assert!(!second.materialized_cell().is_resolved());
        second
            .materialized_cell()
            .complete(Materialized::value(2_u8))
            .unwrap();
    }

    proptest! {
        #[test]
        fn prop_with_operations_do_not_mutate_receiver(
            name in "[A-Za-z][A-Za-z0-9-]{0,15}",
            value in "[ -~]{0,32}",
            status in 200_u16..600,
        ) {
            let base = Reply::ok().with_header("X-Base", "1");
            let before_headers = base.headers().clone();

            let updated = base
                .with_header(&name, value.clone())
                .with_status(StatusCode::from_u16(status).unwrap())
                .as_content_type("application/json");

            prop_assert_eq!(base.headers(), &before_headers);
            prop_assert_eq!(base.status_code(), StatusCode::OK);
            prop_assert_eq!(base.content_type(), DEFAULT_CONTENT_TYPE);
            prop_assert_eq!(updated.header_all(&name).last(), Some(&value));
        }
    }
}
