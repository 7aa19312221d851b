//! HTTP server implementation.
//!
//! The server accepts HTTP/1.1 connections on a tokio listener, turns each
//! request into a [`RequestContext`](sluice_core::RequestContext), runs the
//! matching route and writes the resulting reply back with backpressure.
//!
//! # Shutdown
//!
//! Once the [`ShutdownSignal`] fires the accept loop stops, open connections
//! finish the response they are writing and close, and the server waits for
//! them up to the configured shutdown timeout.
//!
//! # Example
//!
//! ```rust,no_run
//! use sluice_core::{Reply, RequestContext};
//! use sluice_server::{Routes, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sluice_server::ServerError> {
//!     let routes = Routes::new()
//!         .get("/tests/text", |_ctx: RequestContext| async { Reply::ok().text("Hello World!\n") });
//!
//!     Server::builder()
//!         .http_addr("127.0.0.1:8080")
//!         .routes(routes)
//!         .build()
//!         .run()
//!         .await
//! }
//! ```

use std::convert::Infallible;
use std::net::{AddrParseError, SocketAddr};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::FutureExt;
use http::{Request, StatusCode};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::inbound::into_context;
use crate::responder::{bare, into_response, HttpResponse};
use crate::routes::Routes;
use crate::shutdown::ShutdownSignal;

/// The Sluice HTTP server.
pub struct Server {
    config: ServerConfig,
    routes: Arc<Routes>,
}

impl Server {
    /// Creates a server serving `routes`.
    #[must_use]
    pub fn new(config: ServerConfig, routes: Routes) -> Self {
        Self {
            config,
            routes: Arc::new(routes),
        }
    }

    /// Creates a new server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the route table.
    #[must_use]
    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Runs the server until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and runs until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "server listening");

        let connections = TaskTracker::new();
        let keep_alive = self.config.keep_alive();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        connections.spawn(serve_connection(
                            Arc::clone(&self.routes),
                            stream,
                            remote_addr,
                            keep_alive,
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    info!("shutdown signal received, stopping server");
                    break;
                }
            }
        }

        drop(listener);
        connections.close();

        let timeout = self.config.shutdown_timeout();
        info!(
            timeout_ms = duration_ms(timeout),
            active = connections.len(),
            "waiting for connections to close"
        );
        if tokio::time::timeout(timeout, connections.wait()).await.is_err() {
            warn!(active = connections.len(), "shutdown timeout reached with connections still open");
        }

        info!("server stopped");
        Ok(())
    }
}

/// Runs one request through `routes` and converts the reply.
///
/// A panic escaping the route handler becomes a bare `500`; handlers built
/// from entry points never let one escape.
pub async fn handle<B>(routes: &Routes, request: Request<B>) -> HttpResponse
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display + Send,
{
    let started = Instant::now();
    let ctx = into_context(request);
    let request_id = ctx.request_id();
    let method = ctx.method().clone();
    let path = ctx.path().to_string();

    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| routes.dispatch(ctx))) {
        Ok(running) => AssertUnwindSafe(running).catch_unwind().await,
        Err(payload) => Err(payload),
    };

    let response = match outcome {
        Ok(reply) => into_response(reply),
        Err(_) => {
            error!(%request_id, %method, path = %path, "route handler panicked");
            bare(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    debug!(
        %request_id,
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = duration_ms(started.elapsed()),
        "request handled"
    );
    response
}

async fn serve_connection(
    routes: Arc<Routes>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    keep_alive: bool,
    shutdown: ShutdownSignal,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let routes = Arc::clone(&routes);
        async move { Ok::<_, Infallible>(handle(&routes, request).await) }
    });

    let conn = http1::Builder::new()
        .keep_alive(keep_alive)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    let result = loop {
        tokio::select! {
            result = conn.as_mut() => break result,
            () = shutdown.recv(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    };

    if let Err(e) = result {
        debug!(remote = %remote_addr, error = %e, "connection closed with error");
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Builder for configuring and creating a [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    config_builder: ServerConfigBuilder,
    routes: Routes,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.http_addr(addr);
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.shutdown_timeout(timeout);
        self
    }

    /// Enables or disables HTTP/1.1 keep-alive.
    #[must_use]
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.keep_alive(enabled);
        self
    }

    /// Sets the route table.
    #[must_use]
    pub fn routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server::new(self.config_builder.build(), self.routes)
    }
}

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured address could not be parsed.
    #[error("invalid address '{addr}': {source}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parse failure.
        #[source]
        source: AddrParseError,
    },

    /// Binding the listener failed.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// I/O error during server operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
