//! Outbound adapter: [`Reply`] to hyper response.
//!
//! Converting a reply starts its body source. The value the source
//! materializes is written into the reply's cell at that moment, so code
//! waiting on [`Reply::materialized_value`] wakes as soon as the response
//! starts flushing. The chunks themselves are pulled by hyper with
//! backpressure; a failing chunk aborts the response.
//!
//! A reply is served at most once. Serving it again answers a bare 500 and
//! cancels the body the second attempt would have started.

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use http::{HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::Frame;
use sluice_core::{Cancellable, Reply, ReplyParts, StreamError};
use std::convert::Infallible;
use tracing::warn;

/// Body type of every response the server writes.
pub type ResponseBody = UnsyncBoxBody<Bytes, StreamError>;

/// The HTTP response produced for a reply.
pub type HttpResponse = Response<ResponseBody>;

/// Starts the reply's body and builds the response around it.
///
/// Header names or values that are not valid HTTP are skipped with a
/// warning rather than failing the whole response.
pub fn into_response(reply: Reply) -> HttpResponse {
    let ReplyParts {
        status,
        headers,
        cookies,
        content_type,
        body,
        materialized,
    } = reply.into_parts();

    let exact_len = body.exact_len();
    let running = body.materialize();
    let value = running.value.clone();
    if let Err(e) = materialized.complete(running.value) {
        warn!(error = %e, "reply served twice, refusing to start its body again");
        if let Some(handle) = value.downcast::<Cancellable>() {
            handle.cancel();
        }
        return bare(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let frames = running.stream.map_ok(Frame::data);
    let mut response = Response::new(StreamBody::new(frames).boxed_unsync());
    *response.status_mut() = status;

    let map = response.headers_mut();
    for (name, values) in &headers {
        let Ok(header) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!(header = %name, "skipping invalid header name");
            continue;
        };
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    map.append(header.clone(), value);
                }
                Err(_) => warn!(header = %name, "skipping invalid header value"),
            }
        }
    }

    if !map.contains_key(CONTENT_TYPE) && !content_type.is_empty() {
        match HeaderValue::from_str(&content_type) {
            Ok(value) => {
                map.insert(CONTENT_TYPE, value);
            }
            Err(_) => warn!(content_type = %content_type, "skipping invalid content type"),
        }
    }

    for cookie in &cookies {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => {
                map.append(SET_COOKIE, value);
            }
            Err(_) => warn!(cookie = %cookie.name(), "skipping invalid cookie"),
        }
    }

    if let Some(len) = exact_len.filter(|_| allows_body(status)) {
        map.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }

    response
}

/// A bodiless response with only a status, for failures outside any chain.
pub fn bare(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(
        Empty::<Bytes>::new()
            .map_err(|never: Infallible| -> StreamError { match never {} })
            .boxed_unsync(),
    );
    *response.status_mut() = status;
    response
}

fn allows_body(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{Body, Cookie, Materialized};
    use std::sync::Arc;
    use std::time::Duration;

    async fn drain(response: HttpResponse) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_text_reply() {
        let response = into_response(Reply::ok().text("Hello World!\n"));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(response.headers()[CONTENT_LENGTH], "13");
        assert_eq!(drain(response).await, "Hello World!\n");
    }

    #[tokio::test]
    async fn test_headers_and_cookies() {
        let reply = Reply::ok()
            .with_header("X-Trace", "a")
            .with_header("x-trace", "b")
            .with_header("bad header", "ignored")
            .with_cookie(Cookie::new("session", "abc").path("/"))
            .json_str("{}");

        let response = into_response(reply);
        let traces: Vec<_> = response.headers().get_all("x-trace").iter().collect();
        assert_eq!(traces, ["a", "b"]);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert!(response.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .starts_with("session=abc"));
        assert!(!response.headers().contains_key("bad header"));
    }

    #[tokio::test]
    async fn test_explicit_content_type_header_wins() {
        let reply = Reply::ok()
            .with_header("content-type", "text/csv")
            .text("a,b");
        let response = into_response(reply);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/csv");
    }

    #[tokio::test]
    async fn test_no_content_has_no_length() {
        let response = into_response(Reply::no_content());
        assert!(!response.headers().contains_key(CONTENT_LENGTH));
    }

    #[tokio::test]
    async fn test_materialized_value_resolves_on_conversion() {
        let reply = Reply::ok().with_body(Body::tick(
            Duration::ZERO,
            Duration::from_millis(10),
            || "data: tick\n\n".to_string(),
        ));
        let waiting = reply.materialized_cell().wait_as::<Cancellable>();

        let response = into_response(reply.clone());
        let handle = waiting.await.unwrap();
        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), "data: tick\n\n");

        assert!(handle.cancel());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_plain_body_resolves_not_used() {
        let reply = Reply::ok().text("x");
        let _response = into_response(reply.clone());
        let value = reply.materialized_cell().try_get().unwrap();
        assert!(matches!(value, Materialized::NotUsed));
    }

    fn ticking(base: &Reply) -> Reply {
        base.with_body(Body::tick(
            Duration::ZERO,
            Duration::from_millis(10),
            || "data: tick\n\n".to_string(),
        ))
    }

    #[tokio::test]
    async fn test_replies_from_one_base_get_their_own_handles() {
        let base = Reply::ok().as_content_type("text/event-stream");
        let first = ticking(&base);
        let second = ticking(&base);
        let first_handle = first.materialized_value_as::<Cancellable>();
        let second_handle = second.materialized_value_as::<Cancellable>();

        let mut first_body = into_response(first).into_body();
        let mut second_body = into_response(second).into_body();
        let first_handle = first_handle.await.unwrap();
        let second_handle = second_handle.await.unwrap();
        assert!(!Arc::ptr_eq(&first_handle, &second_handle));
        assert!(!second_handle.is_cancelled());

        assert!(first_handle.cancel());
        assert!(first_body.frame().await.is_none());

        let frame = second_body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), "data: tick\n\n");
        assert!(second_handle.cancel());
        assert!(second_body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_serving_a_reply_twice_is_refused() {
        let reply = ticking(&Reply::ok());
        let waiting = reply.materialized_value_as::<Cancellable>();

        let first = into_response(reply.clone());
        let again = into_response(reply);
        assert_eq!(again.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(drain(again).await.is_empty());

        let handle = waiting.await.unwrap();
        assert!(!handle.is_cancelled());
        let mut body = first.into_body();
        assert!(body.frame().await.unwrap().is_ok());
        assert!(handle.cancel());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_failure_aborts_body() {
        let chunks = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"first")),
            Err(StreamError::Producer {
                message: "upstream closed".into(),
            }),
        ]);
        let response = into_response(Reply::ok().chunked(chunks));
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), "first");
        assert!(body.frame().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_bare_response() {
        let response = bare(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(drain(response).await.is_empty());
    }
}
