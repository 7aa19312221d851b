//! Demo endpoint bodies.
//!
//! Each function builds the reply of one endpoint. They know nothing about
//! the chain guarding them; [`DemoApp`](crate::DemoApp) wires them to routes.

use std::sync::OnceLock;
use std::time::Duration;

use serde_json::json;
use sluice_core::{Body, Cancellable, Reply, RequestContext, StreamError};
use tracing::{debug, warn};

/// Number of paragraph copies in the huge text.
pub const HUGE_TEXT_REPEAT: usize = 1000;

const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
Vestibulum rhoncus ultrices neque, nec consectetur ex molestie et. Integer dolor \
purus, laoreet vel condimentum vel, pulvinar at augue. Quisque tempor ac nisl vitae \
faucibus. Nunc placerat lacus dolor, nec finibus nibh semper eget.\n\
Curabitur enim nisl, sollicitudin at odio laoreet, finibus gravida tellus. Nulla \
auctor urna magna, non egestas eros dignissim sollicitudin. Morbi fringilla pulvinar \
diam sed fermentum. Praesent ac tincidunt urna.";

/// `GET /tests/text`
pub fn text() -> Reply {
    Reply::ok().text("Hello World!\n")
}

/// The huge text: [`HUGE_TEXT_REPEAT`] paragraphs joined by newlines,
/// followed by a final newline. Built once.
pub fn huge_text_content() -> &'static str {
    static HUGE: OnceLock<String> = OnceLock::new();
    HUGE.get_or_init(|| {
        let mut text = vec![LOREM; HUGE_TEXT_REPEAT].join("\n");
        text.push('\n');
        text
    })
}

/// `GET /tests/huge`
pub fn huge() -> Reply {
    Reply::ok().text(huge_text_content())
}

/// `GET /tests/json`
pub fn json() -> Reply {
    Reply::ok().json_value(&json!({ "message": "Hello World!" }))
}

/// `GET /tests/html`
pub fn html() -> Reply {
    Reply::ok().html("<h1>Hello World!</h1>")
}

/// `POST /tests/post`: echoes the request body as a chunked JSON reply.
pub fn echo(ctx: &RequestContext) -> Result<Reply, StreamError> {
    let body = ctx.body_stream()?;
    Ok(Reply::ok().as_content_type("application/json").chunked(body))
}

/// One event of the event stream.
pub fn event() -> String {
    let payload = json!({
        "time": chrono::Utc::now().timestamp_millis(),
        "value": "",
    });
    format!("data: {payload}\n\n")
}

/// `GET /tests/sse`: one event every `tick`, cancelled `cancel_after` once
/// the body starts flowing.
///
/// Must be called within a Tokio runtime; the cancellation timer is spawned
/// on it.
pub fn event_stream(tick: Duration, cancel_after: Duration) -> Reply {
    let reply = Reply::ok()
        .as_content_type("text/event-stream")
        .with_body(Body::tick(Duration::ZERO, tick, event));

    let handle = reply.materialized_value_as::<Cancellable>();
    tokio::spawn(async move {
        match handle.await {
            Ok(handle) => {
                tokio::time::sleep(cancel_after).await;
                handle.cancel();
                debug!(?cancel_after, "event stream cancelled");
            }
            Err(err) => warn!(error = %err, "event stream never started"),
        }
    });

    reply
}
