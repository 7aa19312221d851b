//! Exact-match route table.
//!
//! A route maps a method and a literal path to a handler producing a
//! [`Reply`]. Handlers are usually an entry point wrapping an action chain,
//! so every failure has already been turned into a reply by the time the
//! table sees it. Requests matching no route get a JSON `404`.
//!
//! # Example
//!
//! ```rust
//! use sluice_core::{Reply, RequestContext};
//! use sluice_server::Routes;
//!
//! let routes = Routes::new()
//!     .get("/tests/text", |_ctx: RequestContext| async { Reply::ok().text("Hello World!\n") });
//!
//! assert!(routes.contains(&http::Method::GET, "/tests/text"));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Method;
use serde_json::json;
use sluice_core::{Reply, RequestContext};

/// Future returned by a route handler.
pub type RouteFuture = Pin<Box<dyn Future<Output = Reply> + Send>>;

/// A type-erased route handler.
pub type RouteHandler = Arc<dyn Fn(RequestContext) -> RouteFuture + Send + Sync>;

/// Table of routes keyed by method and path.
#[derive(Clone, Default)]
pub struct Routes {
    table: HashMap<(Method, String), RouteHandler>,
}

impl Routes {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. A later registration for the same method and
    /// path replaces the earlier one.
    #[must_use]
    pub fn route<F, Fut>(mut self, method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        let handler: RouteHandler = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.table.insert((method, path.into()), handler);
        self
    }

    /// Registers a `GET` handler.
    #[must_use]
    pub fn get<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    /// Registers a `POST` handler.
    #[must_use]
    pub fn post<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    /// Returns `true` if a handler is registered for `method` and `path`.
    #[must_use]
    pub fn contains(&self, method: &Method, path: &str) -> bool {
        self.table.contains_key(&(method.clone(), path.to_string()))
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Runs the handler matching the request, or answers `404`.
    pub fn dispatch(&self, ctx: RequestContext) -> RouteFuture {
        let key = (ctx.method().clone(), ctx.path().to_string());
        match self.table.get(&key) {
            Some(handler) => handler(ctx),
            None => {
                tracing::debug!(request_id = %ctx.request_id(), path = %key.1, "no route matched");
                let reply = not_found(&key.1);
                Box::pin(async move { reply })
            }
        }
    }
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut routes: Vec<String> = self
            .table
            .keys()
            .map(|(method, path)| format!("{method} {path}"))
            .collect();
        routes.sort();
        f.debug_struct("Routes").field("routes", &routes).finish()
    }
}

fn not_found(path: &str) -> Reply {
    Reply::not_found().json_value(&json!({ "error": "Not Found", "path": path }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn request(method: Method, uri: &str) -> RequestContext {
        RequestContext::builder().method(method).uri(uri).build().unwrap()
    }

    #[tokio::test]
    async fn test_exact_match() {
        let routes = Routes::new()
            .get("/tests/text", |_ctx| async { Reply::ok().text("get") })
            .post("/tests/text", |_ctx| async { Reply::ok().text("post") });

        let reply = routes.dispatch(request(Method::POST, "/tests/text?x=1")).await;
        assert_eq!(reply.body().collect().await.unwrap(), "post");
        assert_eq!(routes.len(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_is_not_found() {
        let routes = Routes::new().get("/tests/text", |_ctx| async { Reply::ok() });

        let reply = routes.dispatch(request(Method::GET, "/tests/text/")).await;
        assert_eq!(reply.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            reply.body().collect().await.unwrap(),
            r#"{"error":"Not Found","path":"/tests/text/"}"#
        );

        let reply = routes.dispatch(request(Method::DELETE, "/tests/text")).await;
        assert_eq!(reply.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_later_registration_replaces() {
        let routes = Routes::new()
            .get("/a", |_ctx| async { Reply::ok() })
            .get("/a", |_ctx| async { Reply::no_content() });
        assert_eq!(routes.len(), 1);
        assert!(routes.contains(&Method::GET, "/a"));
        assert!(!routes.is_empty());
    }
}
