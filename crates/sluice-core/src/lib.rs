//! # Sluice Core
//!
//! Core types for the Sluice request pipeline.
//!
//! - [`RequestContext`] - The inbound request plus request-scoped state
//! - [`RequestId`] - UUID v7 request identifier
//! - [`Reply`] - Immutable response description with a streaming [`Body`]
//! - [`MaterializedCell`] - Write-once side channel resolved when a body starts draining
//! - [`Cancellable`] - Cooperative stop handle for indefinite bodies
//! - [`ActionError`], [`StreamError`], [`MaterializeError`] - Error taxonomy

#![doc(html_root_url = "https://docs.rs/sluice-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod cancel;
mod context;
mod cookie;
mod error;
mod materialized;
mod reply;

pub use body::{Body, ChunkStream, Materialization, DEFAULT_CHUNK_SIZE};
pub use cancel::Cancellable;
pub use context::{RequestContext, RequestContextBuilder, RequestHead, RequestId};
pub use cookie::{Cookie, SameSite};
pub use error::{ActionError, ActionResult, MaterializeError, ReplyError, StreamError};
pub use materialized::{Materialized, MaterializedCell};
pub use reply::{Reply, ReplyParts, TemplateRenderer, DEFAULT_CONTENT_TYPE};
