// src/health/status.rs
use serde::Serialize;
use std::fmt;
use std::time::Duration;

pub const STATUS_OK: &str = "ok";
pub const STATUS_HEALTHY: &str = "healthy";

/// Backing stores probed by the health check, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Keyval,
    Relational,
}

impl Dependency {
    pub const PROBE_ORDER: [Dependency; 2] = [Dependency::Keyval, Dependency::Relational];

    pub fn name(&self) -> &'static str {
        match self {
            Dependency::Keyval => "redis",
            Dependency::Relational => "postgres",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The health check takes no input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCheckRequest;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{which} unavailable: {cause}")]
pub struct DependencyUnavailable {
    pub which: Dependency,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheckResult {
    Healthy {
        postgres_status: &'static str,
        redis_status: &'static str,
    },
    Unhealthy(DependencyUnavailable),
}

impl HealthCheckResult {
    pub fn healthy() -> Self {
        HealthCheckResult::Healthy {
            postgres_status: STATUS_OK,
            redis_status: STATUS_OK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPingOutcome {
    pub dependency: Dependency,
    pub ok: bool,
    /// Time since the start of the health check, not of this ping alone.
    pub elapsed: Duration,
    pub error: Option<String>,
}

/// Everything one health check produced. `elapsed` and `outcomes` are for
/// logs and metrics; only `result` reaches the caller.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub result: HealthCheckResult,
    pub elapsed: Duration,
    pub outcomes: Vec<DependencyPingOutcome>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self.result, HealthCheckResult::Healthy { .. })
    }

    pub fn into_response(self) -> Result<HealthCheckResponse, DependencyUnavailable> {
        match self.result {
            HealthCheckResult::Healthy {
                postgres_status,
                redis_status,
            } => Ok(HealthCheckResponse {
                status: STATUS_HEALTHY,
                postgres: postgres_status,
                redis: redis_status,
            }),
            HealthCheckResult::Unhealthy(unavailable) => Err(unavailable),
        }
    }
}

/// Wire shape of a successful check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResponse {
    pub status: &'static str,
    pub postgres: &'static str,
    pub redis: &'static str,
}
