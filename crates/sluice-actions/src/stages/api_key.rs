//! API key check.
//!
//! Rejects requests whose API key header is missing or not one of the
//! accepted keys with a `400 Bad Request` and a JSON body:
//!
//! | Situation      | Body                                |
//! |----------------|-------------------------------------|
//! | header missing | `{"error": "No API KEY provided"}`  |
//! | unknown key    | `{"error": "Bad API KEY"}`          |
//!
//! Keys are compared ignoring ASCII case. A header value that is not visible
//! ASCII counts as an unknown key. An accepted key is stored in the context
//! under [`API_KEY_STATE`] for later stages.

use crate::action::{reply_now, Action, ActionFuture, Next};
use serde_json::json;
use sluice_core::{Reply, RequestContext};
use tracing::info;

/// Default header carrying the key.
pub const DEFAULT_HEADER: &str = "Api-Key";

/// Context key under which the accepted key is stored, as a `String`.
pub const API_KEY_STATE: &str = "api_key";

/// API key check action.
#[derive(Debug, Clone)]
pub struct ApiKeyCheck {
    header: String,
    keys: Vec<String>,
}

impl ApiKeyCheck {
    /// Accepts the given keys in the [`DEFAULT_HEADER`] header.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: DEFAULT_HEADER.to_string(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads the key from another header.
    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    fn is_accepted(&self, key: &str) -> bool {
        self.keys.iter().any(|accepted| accepted.eq_ignore_ascii_case(key))
    }
}

impl Action for ApiKeyCheck {
    fn name(&self) -> &'static str {
        "api_key_check"
    }

    fn apply(&self, ctx: RequestContext, next: Next) -> ActionFuture {
        let Some(value) = ctx.headers().get(self.header.as_str()) else {
            info!(request_id = %ctx.request_id(), path = %ctx.path(), "no API key provided");
            return reply_now(Reply::bad_request().json_value(&json!({ "error": "No API KEY provided" })));
        };

        let accepted = value
            .to_str()
            .ok()
            .filter(|key| self.is_accepted(key))
            .map(ToString::to_string);
        match accepted {
            Some(key) => next.run(ctx.with_value(API_KEY_STATE, key)),
            None => {
                info!(request_id = %ctx.request_id(), path = %ctx.path(), "bad API key");
                reply_now(Reply::bad_request().json_value(&json!({ "error": "Bad API KEY" })))
            }
        }
    }
}
