// src/metrics/server.rs
use super::MetricsRegistry;
use crate::config::MetricServerConfig;
use crate::runner::{CoreService, ShutdownSignal};
use async_trait::async_trait;
use futures::future::{ready, Ready};
use hyper::header::CONTENT_TYPE;
use hyper::service::make_service_fn;
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Service, ServiceBuilder};
use tracing::{error, info};

pub const METRICS_PATH: &str = "/metrics";

/// Serves the Prometheus scrape endpoint.
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<MetricsRegistry>,
}

impl MetricsService {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    fn respond(&self, req: &Request<Body>) -> Response<Body> {
        if req.uri().path() != METRICS_PATH {
            return plain(StatusCode::NOT_FOUND, "Not Found");
        }
        if req.method() != Method::GET {
            return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }

        match self.registry.gather() {
            Ok(metrics) => {
                let mut response = Response::new(Body::from(metrics));
                if let Ok(value) = self.registry.content_type().parse() {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                response
            }
            Err(e) => {
                error!(error = %e, "Failed to encode metrics");
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

impl Service<Request<Body>> for MetricsService {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        ready(Ok(self.respond(&req)))
    }
}

pub struct MetricsServer {
    config: MetricServerConfig,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(config: MetricServerConfig, registry: Arc<MetricsRegistry>) -> Self {
        Self { config, registry }
    }
}

#[async_trait]
impl CoreService for MetricsServer {
    fn name(&self) -> &str {
        "metrics-server"
    }

    async fn serve(&self, shutdown: ShutdownSignal) -> anyhow::Result<()> {
        let addr = self.config.addr()?;
        let service = ServiceBuilder::new()
            .timeout(self.config.write_timeout)
            .service(MetricsService::new(self.registry.clone()));

        let make_service = make_service_fn(move |_| {
            let service = service.clone();
            async move { Ok::<_, Infallible>(service) }
        });

        let server = Server::try_bind(&addr)?
            .http1_header_read_timeout(self.config.read_timeout)
            .serve(make_service);

        info!("Metrics server listening on http://{}{}", addr, METRICS_PATH);

        server.with_graceful_shutdown(shutdown.wait()).await?;

        info!("Metrics server stopped");
        Ok(())
    }
}
