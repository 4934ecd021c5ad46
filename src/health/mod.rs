// src/health/mod.rs
mod checker;
mod status;

pub use checker::HealthHandler;
pub use status::{
    Dependency, DependencyPingOutcome, DependencyUnavailable, HealthCheckRequest,
    HealthCheckResponse, HealthCheckResult, HealthReport, STATUS_HEALTHY, STATUS_OK,
};
