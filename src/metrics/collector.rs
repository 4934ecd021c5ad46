// src/metrics/collector.rs
use crate::health::{HealthCheckResult, HealthReport};
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Encode every registered family in the Prometheus text format.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

pub struct MetricsCollector {
    // Request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // Health metrics
    pub health_checks_total: IntCounterVec,
    pub dependency_ping_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let http_requests_total = IntCounterVec::new(
            Opts::new("app_http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "app_http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let health_checks_total = IntCounterVec::new(
            Opts::new(
                "app_health_checks_total",
                "Health checks by outcome and failing dependency",
            ),
            &["outcome", "dependency"],
        )?;
        registry.register(Box::new(health_checks_total.clone()))?;

        // Elapsed is cumulative from the start of the check.
        let dependency_ping_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "app_dependency_ping_duration_seconds",
                "Time from health check start until each dependency ping finished",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0]),
            &["dependency", "outcome"],
        )?;
        registry.register(Box::new(dependency_ping_duration_seconds.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration_seconds,
            health_checks_total,
            dependency_ping_duration_seconds,
        })
    }

    pub fn record_request(&self, method: &str, path: &str, status_code: u16, duration: Duration) {
        let status = status_code.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration.as_secs_f64());
    }

    pub fn record_health_check(&self, report: &HealthReport) {
        let (outcome, dependency) = match &report.result {
            HealthCheckResult::Healthy { .. } => ("healthy", "none"),
            HealthCheckResult::Unhealthy(unavailable) => ("unhealthy", unavailable.which.name()),
        };
        self.health_checks_total
            .with_label_values(&[outcome, dependency])
            .inc();

        for ping in &report.outcomes {
            let outcome = if ping.ok { "success" } else { "failure" };
            self.dependency_ping_duration_seconds
                .with_label_values(&[ping.dependency.name(), outcome])
                .observe(ping.elapsed.as_secs_f64());
        }
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{Dependency, DependencyPingOutcome, DependencyUnavailable};

    fn text(registry: &MetricsRegistry) -> String {
        String::from_utf8(registry.gather().unwrap()).unwrap()
    }

    #[test]
    fn request_metrics_are_exported() {
        let registry = MetricsRegistry::new().unwrap();
        registry
            .collector()
            .record_request("GET", "/health", 200, Duration::from_millis(3));

        let output = text(&registry);
        assert!(output.contains(r#"app_http_requests_total{method="GET",path="/health",status="200"} 1"#));
        assert!(output.contains("app_http_request_duration_seconds_count"));
    }

    #[test]
    fn unhealthy_check_records_failing_dependency() {
        let registry = MetricsRegistry::new().unwrap();
        let report = HealthReport {
            result: HealthCheckResult::Unhealthy(DependencyUnavailable {
                which: Dependency::Keyval,
                cause: "connection refused".to_string(),
            }),
            elapsed: Duration::from_millis(2),
            outcomes: vec![DependencyPingOutcome {
                dependency: Dependency::Keyval,
                ok: false,
                elapsed: Duration::from_millis(2),
                error: Some("connection refused".to_string()),
            }],
        };
        registry.collector().record_health_check(&report);

        let output = text(&registry);
        assert!(output.contains(r#"app_health_checks_total{dependency="redis",outcome="unhealthy"} 1"#));
        assert!(output.contains(
            r#"app_dependency_ping_duration_seconds_count{dependency="redis",outcome="failure"} 1"#
        ));
        assert!(!output.contains(r#"dependency="postgres""#));
    }

    #[test]
    fn content_type_is_prometheus_text() {
        let registry = MetricsRegistry::new().unwrap();
        assert!(registry.content_type().starts_with("text/plain"));
    }
}
