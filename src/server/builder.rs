// src/server/builder.rs
use crate::config::HttpServerConfig;
use crate::runner::{CoreService, ShutdownSignal};
use crate::server::listener::bind_tcp;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hyper::{server::conn::Http, Body, Request, Response};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower::Service;
use tracing::{info, warn};

/// Builder pattern so `app.rs` can inject the request handler.
pub struct ServerBuilder<H> {
    config: HttpServerConfig,
    handler: Option<H>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Sync + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(config: HttpServerConfig) -> Self {
        Self {
            config,
            handler: None,
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<HttpServer<H>> {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;

        Ok(HttpServer {
            addr: self.config.addr()?,
            handler,
            read_timeout: self.config.read_timeout,
            grace_period: self.config.grace_period,
        })
    }
}

/// Connection-per-task HTTP/1 server with graceful draining.
pub struct HttpServer<H> {
    addr: SocketAddr,
    handler: H,
    read_timeout: Duration,
    grace_period: Duration,
}

impl<H> HttpServer<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Sync + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept on an already bound listener until `shutdown` fires, then let
    /// open connections finish their current request within the grace period.
    pub async fn serve_on(&self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<()> {
        let mut http = Http::new();
        http.http1_header_read_timeout(self.read_timeout);

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(%err, "failed to accept connection");
                            continue;
                        }
                    };

                    let conn = http.serve_connection(stream, self.handler.clone());
                    let shutdown = shutdown.clone();

                    // One Tokio task per connection.
                    connections.spawn(async move {
                        tokio::pin!(conn);
                        let mut draining = false;
                        loop {
                            tokio::select! {
                                res = conn.as_mut() => {
                                    if let Err(err) = res {
                                        warn!(%peer, %err, "connection error");
                                    }
                                    break;
                                }
                                _ = shutdown.wait(), if !draining => {
                                    draining = true;
                                    conn.as_mut().graceful_shutdown();
                                }
                            }
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        info!(open_connections = connections.len(), "HTTP server draining connections");

        let drained = tokio::time::timeout(self.grace_period, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "Grace period elapsed, closing open connections"
            );
            connections.shutdown().await;
        }

        info!("HTTP server stopped");
        Ok(())
    }
}

#[async_trait]
impl<H> CoreService for HttpServer<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Sync + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    fn name(&self) -> &str {
        "http-server"
    }

    async fn serve(&self, shutdown: ShutdownSignal) -> Result<()> {
        let listener = bind_tcp(self.addr).await?;
        info!("HTTP server listening on {}", listener.local_addr()?);
        self.serve_on(listener, shutdown).await
    }
}
