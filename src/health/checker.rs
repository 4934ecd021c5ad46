// src/health/checker.rs
use super::status::{
    Dependency, DependencyPingOutcome, DependencyUnavailable, HealthCheckRequest,
    HealthCheckResult, HealthReport,
};
use crate::clients::{PingError, Pinger};
use crate::context::RequestContext;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Decides service health by probing the keyval store, then the relational
/// store, stopping at the first failure.
#[derive(Clone)]
pub struct HealthHandler {
    keyval: Arc<dyn Pinger>,
    relational: Arc<dyn Pinger>,
}

impl HealthHandler {
    pub fn new(keyval: Arc<dyn Pinger>, relational: Arc<dyn Pinger>) -> Self {
        Self { keyval, relational }
    }

    fn pinger(&self, dependency: Dependency) -> &dyn Pinger {
        match dependency {
            Dependency::Keyval => self.keyval.as_ref(),
            Dependency::Relational => self.relational.as_ref(),
        }
    }

    pub async fn handle(&self, ctx: &RequestContext, _req: &HealthCheckRequest) -> HealthReport {
        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(Dependency::PROBE_ORDER.len());

        info!("Starting health check");

        for dependency in Dependency::PROBE_ORDER {
            let result: Result<(), PingError> = ctx.run(self.pinger(dependency).ping(ctx)).await;
            let elapsed = start.elapsed();

            if let Err(err) = result {
                error!(
                    %dependency,
                    error = %err,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "{} health check failed",
                    dependency
                );

                outcomes.push(DependencyPingOutcome {
                    dependency,
                    ok: false,
                    elapsed,
                    error: Some(err.to_string()),
                });

                return HealthReport {
                    result: HealthCheckResult::Unhealthy(DependencyUnavailable {
                        which: dependency,
                        cause: err.to_string(),
                    }),
                    elapsed,
                    outcomes,
                };
            }

            debug!(
                %dependency,
                elapsed_ms = elapsed.as_millis() as u64,
                "{} connection healthy",
                dependency
            );

            outcomes.push(DependencyPingOutcome {
                dependency,
                ok: true,
                elapsed,
                error: None,
            });
        }

        let elapsed = start.elapsed();
        info!(
            status = "healthy",
            duration_ms = elapsed.as_millis() as u64,
            "Health check completed successfully"
        );

        HealthReport {
            result: HealthCheckResult::healthy(),
            elapsed,
            outcomes,
        }
    }
}
