//! Wiring of the demo endpoints to routes.

use std::sync::Arc;

use sluice_actions::stages::{api_managed, ApiKeyCheck, ApiManaged, Throttle};
use sluice_actions::{ActionExt, Dispatcher, DispatcherConfig};
use sluice_config::SluiceConfig;
use sluice_core::{Reply, RequestContext};
use sluice_server::{Routes, Server, ShutdownSignal};
use tracing::info;

use crate::endpoints;
use crate::error::{DemoError, DemoResult};
use crate::upstream::{UpstreamClient, DEFAULT_TIMEOUT};

/// The demo service: one managed chain shared by every guarded endpoint.
///
/// | Route              | Chain        | Entry point   |
/// |--------------------|--------------|---------------|
/// | `GET /tests/text`  | none         | sync          |
/// | `GET /tests/sse`   | none         | sync          |
/// | `GET /tests/huge`  | managed      | sync          |
/// | `GET /tests/json`  | managed      | sync          |
/// | `GET /tests/html`  | managed      | sync          |
/// | `POST /tests/post` | managed      | sync          |
/// | `GET /tests/ws`    | managed      | async         |
///
/// The throttle of the managed chain is shared too, so its limit counts
/// calls across all managed endpoints.
#[derive(Debug, Clone)]
pub struct DemoApp {
    config: Arc<SluiceConfig>,
    managed: Arc<ApiManaged>,
    dispatcher: Dispatcher,
    upstream: UpstreamClient,
}

impl DemoApp {
    /// Builds the service, starting its dispatch pool.
    pub fn new(config: SluiceConfig) -> DemoResult<Self> {
        let keys = ApiKeyCheck::new(config.api_key.keys.iter().cloned())
            .header(config.api_key.header.clone());
        let throttle = Throttle::builder()
            .limit(config.throttle.limit)
            .window(config.throttle.window())
            .build();

        let dispatcher = Dispatcher::with_config(
            DispatcherConfig::new()
                .with_threads(config.dispatch.pool_size())
                .with_thread_name(config.dispatch.thread_name.clone()),
        )
        .map_err(DemoError::Dispatch)?;

        let upstream = UpstreamClient::new(config.demo.upstream_url.clone(), DEFAULT_TIMEOUT)?;

        Ok(Self {
            config: Arc::new(config),
            managed: Arc::new(api_managed(keys, throttle)),
            dispatcher,
            upstream,
        })
    }

    /// The configuration the service was built from.
    pub fn config(&self) -> &SluiceConfig {
        &self.config
    }

    /// The dispatch pool running the blocking handlers.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The route table.
    pub fn routes(&self) -> Routes {
        let tick = self.config.demo.sse_tick();
        let cancel_after = self.config.demo.sse_cancel_after();

        Routes::new()
            .get("/tests/text", {
                let pool = self.dispatcher.clone();
                move |ctx: RequestContext| {
                    sluice_actions::entry::sync_on(&pool, ctx, |_ctx| {
                        Ok::<_, anyhow::Error>(endpoints::text())
                    })
                }
            })
            .get("/tests/sse", {
                let pool = self.dispatcher.clone();
                move |ctx: RequestContext| {
                    sluice_actions::entry::sync_on(&pool, ctx, move |_ctx| {
                        Ok::<_, anyhow::Error>(endpoints::event_stream(tick, cancel_after))
                    })
                }
            })
            .get("/tests/huge", self.managed_sync(|_ctx| endpoints::huge()))
            .get("/tests/json", self.managed_sync(|_ctx| endpoints::json()))
            .get("/tests/html", self.managed_sync(|_ctx| endpoints::html()))
            .post("/tests/post", {
                let managed = Arc::clone(&self.managed);
                let pool = self.dispatcher.clone();
                move |ctx: RequestContext| {
                    managed.sync_on(&pool, ctx, |ctx| endpoints::echo(&ctx))
                }
            })
            .get("/tests/ws", {
                let managed = Arc::clone(&self.managed);
                let upstream = self.upstream.clone();
                move |ctx: RequestContext| {
                    let upstream = upstream.clone();
                    managed.async_block(ctx, move |_ctx| async move {
                        let pretty = upstream.fetch_pretty().await?;
                        Ok::<_, DemoError>(Reply::ok().json_str(pretty))
                    })
                }
            })
    }

    fn managed_sync(
        &self,
        body: fn(&RequestContext) -> Reply,
    ) -> impl Fn(RequestContext) -> sluice_actions::BoxFuture<'static, Reply> + Send + Sync + 'static {
        let managed = Arc::clone(&self.managed);
        let pool = self.dispatcher.clone();
        move |ctx| {
            managed.sync_on(&pool, ctx, move |ctx| Ok::<_, anyhow::Error>(body(&ctx)))
        }
    }

    /// A server for the configured address serving [`routes`](Self::routes).
    pub fn server(&self) -> Server {
        Server::builder()
            .http_addr(self.config.server.http_addr.clone())
            .shutdown_timeout(self.config.server.shutdown_timeout())
            .routes(self.routes())
            .build()
    }

    /// Serves until `shutdown` is triggered.
    pub async fn run(self, shutdown: ShutdownSignal) -> DemoResult<()> {
        let server = self.server();
        info!(
            addr = %self.config.server.http_addr,
            routes = server.routes().len(),
            dispatch_threads = self.dispatcher.size(),
            "starting sluice demo"
        );
        server.run_with_shutdown(shutdown).await?;
        Ok(())
    }
}
