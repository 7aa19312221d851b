//! Inbound adapter: hyper request to [`RequestContext`].
//!
//! The request body is not read here. It is wrapped as a lazy chunk stream
//! that the chain may take once through [`RequestContext::body_stream`];
//! trailers are dropped.

use bytes::Bytes;
use futures_util::StreamExt;
use http::Request;
use http_body_util::BodyStream;
use hyper::body::Body;
use sluice_core::{RequestContext, StreamError};

/// Wraps a request and its unread body into a fresh context.
pub fn into_context<B>(request: Request<B>) -> RequestContext
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display + Send,
{
    let (parts, body) = request.into_parts();
    let chunks = BodyStream::new(body).filter_map(|frame| async move {
        match frame {
            Ok(frame) => frame.into_data().ok().map(Ok),
            Err(e) => Some(Err(StreamError::producer(format!("reading request body failed: {e}")))),
        }
    });
    RequestContext::from_parts(parts, chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use http_body_util::Full;

    #[tokio::test]
    async fn test_head_and_body_are_carried_over() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/tests/post?x=1")
            .header("Api-Key", "12345")
            .body(Full::new(Bytes::from_static(b"{\"a\":1}")))
            .unwrap();

        let ctx = into_context(request);
        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/tests/post");
        assert_eq!(ctx.header("api-key"), Some("12345"));
        assert_eq!(ctx.body_bytes().await.unwrap(), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_body_is_single_use() {
        let request = Request::new(Full::new(Bytes::from_static(b"once")));
        let ctx = into_context(request);

        let _stream = ctx.body_stream().unwrap();
        assert!(matches!(ctx.body_bytes().await, Err(StreamError::AlreadyConsumed)));
    }
}
