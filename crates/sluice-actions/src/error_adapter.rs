//! Converts chain failures into error replies.
//!
//! # Error Envelope Format
//!
//! ```json
//! {
//!   "error": {
//!     "kind": "handler_failure",
//!     "message": "handler failed: database offline",
//!     "causes": ["database offline"],
//!     "request_id": "0190c5a4-..."
//!   }
//! }
//! ```

use serde_json::json;
use sluice_core::{ActionError, Reply, RequestContext};
use tracing::{error, info};

/// Builds the 5xx reply for `err`.
///
/// Logs the failure, and every `Accept` header value of the request when one
/// is given. This function cannot fail.
pub fn transform_error(err: &ActionError, ctx: Option<&RequestContext>) -> Reply {
    let causes = err.chain();
    metrics::counter!("sluice_handler_failures_total", "kind" => err.kind()).increment(1);

    let mut body = json!({
        "error": {
            "kind": err.kind(),
            "message": err.to_string(),
            "causes": causes,
        }
    });

    match ctx {
        Some(ctx) => {
            error!(
                request_id = %ctx.request_id(),
                path = %ctx.path(),
                kind = err.kind(),
                error = %err,
                "action chain failed"
            );
            for accept in ctx.header_all("accept") {
                info!(request_id = %ctx.request_id(), "Accept: {accept}");
            }
            body["error"]["request_id"] = json!(ctx.request_id().to_string());
        }
        None => error!(kind = err.kind(), error = %err, "action chain failed"),
    }

    Reply::status(err.status_code()).json_value(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[tokio::test]
    async fn test_handler_failure_envelope() {
        let ctx = RequestContext::builder()
            .header("Accept", "application/json")
            .build()
            .unwrap();
        let err = ActionError::from(anyhow::anyhow!("disk full").context("saving upload"));

        let reply = transform_error(&err, Some(&ctx));
        assert_eq!(reply.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.content_type(), "application/json");

        let body: serde_json::Value =
            serde_json::from_slice(&reply.body().collect().await.unwrap()).unwrap();
        assert_eq!(body["error"]["kind"], "handler_failure");
        assert_eq!(body["error"]["causes"], json!(["saving upload", "disk full"]));
        assert_eq!(body["error"]["request_id"], ctx.request_id().to_string());
    }

    #[test]
    fn test_dispatch_failure_without_context() {
        let reply = transform_error(&ActionError::dispatch("pool gone"), None);
        assert_eq!(reply.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(reply.status_code().is_server_error());
    }
}
