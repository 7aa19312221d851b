//! Test client for in-memory HTTP testing.

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::{TestResponse, TestStream};
use bytes::Bytes;
use http::Method;
use sluice_server::{HttpResponse, Routes};
use std::sync::Arc;

/// A test client for making in-memory HTTP requests.
///
/// Requests go through the same code the server runs for a connection:
/// the hyper request is turned into a context, dispatched on the route
/// table, and the reply is converted back, resolving its materialized
/// value as its body starts. No port is bound.
///
/// # Example
///
/// ```
/// use sluice_core::{Reply, RequestContext};
/// use sluice_server::Routes;
/// use sluice_test::TestClient;
///
/// # tokio_test::block_on(async {
/// let client = TestClient::new(
///     Routes::new().get("/tests/text", |_ctx: RequestContext| async {
///         Reply::ok().text("Hello World!\n")
///     }),
/// );
///
/// let response = client.get("/tests/text").send().await;
/// assert_eq!(response.status_code(), 200);
/// assert_eq!(response.text().unwrap(), "Hello World!\n");
/// # });
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    routes: Arc<Routes>,
    /// Default headers to add to all requests.
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a test client serving `routes`.
    pub fn new(routes: Routes) -> Self {
        Self {
            routes: Arc::new(routes),
            default_headers: Vec::new(),
        }
    }

    /// Adds a default header that will be included in all requests.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The served route table.
    #[must_use]
    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Creates a request builder with a custom method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    /// Serves a built request and returns the raw response.
    pub async fn serve(&self, request: TestRequest) -> HttpResponse {
        sluice_server::handle(&self.routes, request.into_http_request()).await
    }
}

/// A request builder bound to a test client.
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, builder: TestRequestBuilder) -> Self {
        let mut builder = builder;
        for (name, value) in &client.default_headers {
            builder = builder.header(name, value);
        }
        Self { client, builder }
    }

    /// Sets a header on the request.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets the request body as JSON.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request and reads the whole response.
    ///
    /// # Panics
    ///
    /// Panics if the request is invalid or the body fails.
    pub async fn send(self) -> TestResponse {
        self.try_send().await.expect("request should succeed")
    }

    /// Sends the request and reads the whole response, returning a Result.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        TestResponse::from_http(self.client.serve(request).await).await
    }

    /// Sends the request and returns the response with its body unread.
    pub async fn send_streaming(self) -> Result<TestStream, TestError> {
        let request = self.builder.build()?;
        Ok(TestStream::from_http(self.client.serve(request).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;
    use sluice_core::{Reply, RequestContext};

    fn routes() -> Routes {
        Routes::new()
            .get("/tests/text", |_ctx: RequestContext| async {
                Reply::ok().text("Hello World!\n")
            })
            .get("/whoami", |ctx: RequestContext| async move {
                let user = ctx.header("x-user").unwrap_or("anonymous").to_string();
                Reply::ok().text(user)
            })
            .post("/echo", |ctx: RequestContext| async move {
                match ctx.body_bytes().await {
                    Ok(body) => Reply::ok()
                        .as_content_type(ctx.header("content-type").unwrap_or("text/plain"))
                        .binary(body),
                    Err(_) => Reply::bad_request(),
                }
            })
    }

    #[tokio::test]
    async fn test_get() {
        let client = TestClient::new(routes());
        let response = client.get("/tests/text").send().await;

        response
            .assert_status(StatusCode::OK)
            .assert_content_type("text/plain")
            .assert_body_eq("Hello World!\n");
        assert_eq!(response.content_length(), Some(13));
    }

    #[tokio::test]
    async fn test_default_header() {
        let client = TestClient::new(routes()).with_default_header("X-User", "alice");
        let response = client.get("/whoami").send().await;
        assert_eq!(response.text().unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_post_json_echo() {
        let client = TestClient::new(routes());
        let response = client
            .post("/echo")
            .json(&json!({"message": "hi"}))
            .send()
            .await;

        response.assert_content_type("application/json");
        assert_eq!(response.json_value().unwrap(), json!({"message": "hi"}));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let client = TestClient::new(routes());
        let response = client.request(Method::DELETE, "/tests/text").send().await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json_value().unwrap()["path"], "/tests/text");
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let client = TestClient::new(routes());
        let result = client.get("/").header("bad header", "x").try_send().await;
        assert!(matches!(result, Err(TestError::RequestBuild(_))));
    }
}
