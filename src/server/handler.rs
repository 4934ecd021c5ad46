// src/server/handler.rs
use super::response::{empty, json, ApiError};
use crate::config::HttpServerConfig;
use crate::context::RequestContext;
use crate::health::{HealthCheckRequest, HealthHandler};
use crate::metrics::{MetricsCollector, Timer};
use crate::runner::ShutdownSignal;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, CONTENT_LENGTH,
};
use hyper::{Body, HeaderMap, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower::Service;
use tracing::{debug, Instrument};
use uuid::Uuid;

pub const HEALTH_PATH: &str = "/health";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const UNMATCHED_ROUTE: &str = "unmatched";

/// Per-request behavior derived from the HTTP server configuration.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub enable_cors: bool,
    pub body_limit: u64,
    pub skip_request_id: bool,
    /// Deadline given to each request's context.
    pub request_timeout: Duration,
}

impl From<&HttpServerConfig> for HandlerSettings {
    fn from(config: &HttpServerConfig) -> Self {
        Self {
            enable_cors: config.enable_cors,
            body_limit: config.body_limit.as_u64(),
            skip_request_id: config.skip_request_id,
            request_timeout: config.write_timeout,
        }
    }
}

/// Routes inbound requests to the health handler. Never fails at the
/// service level; every error becomes a response.
#[derive(Clone)]
pub struct RequestHandler {
    inner: Arc<Inner>,
}

struct Inner {
    health: HealthHandler,
    metrics: Arc<MetricsCollector>,
    settings: HandlerSettings,
    shutdown: ShutdownSignal,
}

impl RequestHandler {
    pub fn new(
        health: HealthHandler,
        metrics: Arc<MetricsCollector>,
        settings: HandlerSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                health,
                metrics,
                settings,
                shutdown,
            }),
        }
    }
}

impl Inner {
    async fn dispatch(&self, req: Request<Body>) -> Response<Body> {
        let timer = Timer::new();
        let method = req.method().clone();
        let route = route_label(req.uri().path());
        let request_id = if self.settings.skip_request_id {
            None
        } else {
            request_id(req.headers())
        };

        let mut response = match self.route(req).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };

        if self.settings.enable_cors {
            apply_cors(response.headers_mut());
        }
        if let Some(id) = request_id {
            response.headers_mut().insert(REQUEST_ID_HEADER, id);
        }

        let status = response.status();
        let elapsed = timer.elapsed();
        self.metrics
            .record_request(method.as_str(), route, status.as_u16(), elapsed);
        debug!(
            %method,
            route,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        response
    }

    async fn route(&self, req: Request<Body>) -> Result<Response<Body>, ApiError> {
        if exceeds_limit(req.headers(), self.settings.body_limit) {
            return Err(ApiError::PayloadTooLarge);
        }

        if self.settings.enable_cors && req.method() == Method::OPTIONS {
            return Ok(empty(StatusCode::NO_CONTENT));
        }

        match req.uri().path() {
            HEALTH_PATH if req.method() == Method::GET => self.health_check().await,
            HEALTH_PATH => Err(ApiError::MethodNotAllowed),
            _ => Err(ApiError::NotFound),
        }
    }

    async fn health_check(&self) -> Result<Response<Body>, ApiError> {
        let ctx = RequestContext::with_timeout(self.settings.request_timeout)
            .with_cancellation(self.shutdown.child_token());

        let report = self.health.handle(&ctx, &HealthCheckRequest).await;
        self.metrics.record_health_check(&report);

        match report.into_response() {
            Ok(body) => json(StatusCode::OK, &body),
            Err(unavailable) => Err(ApiError::DependencyUnavailable(unavailable.which)),
        }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let inner = self.inner.clone();
        let span = tracing::info_span!("request", method = %req.method(), path = %req.uri().path());
        Box::pin(async move { Ok(inner.dispatch(req).await) }.instrument(span))
    }
}

fn route_label(path: &str) -> &'static str {
    match path {
        HEALTH_PATH => HEALTH_PATH,
        _ => UNMATCHED_ROUTE,
    }
}

fn exceeds_limit(headers: &HeaderMap, limit: u64) -> bool {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map_or(false, |length| length > limit)
}

/// Echo a usable inbound id, otherwise mint a new one.
fn request_id(headers: &HeaderMap) -> Option<HeaderValue> {
    if let Some(inbound) = headers.get(REQUEST_ID_HEADER) {
        if !inbound.is_empty() {
            return Some(inbound.clone());
        }
    }
    HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type, x-request-id"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
}
