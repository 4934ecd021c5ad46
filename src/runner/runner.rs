// src/runner/runner.rs
use super::{os_signal, CoreService, InfrastructureService, ShutdownSignal};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("{} service(s) failed: {}", .0.len(), .0.join("; "))]
    ServiceFailures(Vec<String>),
}

type CoreExit = (String, anyhow::Result<()>);

/// Runs core services until a stop signal, then tears down infrastructure.
pub struct Runner {
    core: Vec<Arc<dyn CoreService>>,
    infrastructure: Vec<Arc<dyn InfrastructureService>>,
    shutdown: ShutdownSignal,
    grace_period: Duration,
}

impl Runner {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            core: Vec::new(),
            infrastructure: Vec::new(),
            shutdown: ShutdownSignal::new(),
            grace_period,
        }
    }

    pub fn with_core_service(mut self, service: Arc<dyn CoreService>) -> Self {
        self.core.push(service);
        self
    }

    /// Register a dependency for teardown. A second registration under the
    /// same name is ignored so each dependency is closed once.
    pub fn with_infrastructure_service(mut self, service: Arc<dyn InfrastructureService>) -> Self {
        if self
            .infrastructure
            .iter()
            .any(|existing| existing.name() == service.name())
        {
            warn!(
                service = service.name(),
                "Infrastructure service already registered, ignoring duplicate"
            );
            return self;
        }
        self.infrastructure.push(service);
        self
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn infrastructure_names(&self) -> Vec<&str> {
        self.infrastructure.iter().map(|s| s.name()).collect()
    }

    /// Run until SIGINT/SIGTERM or until a core service exits.
    pub async fn run(self) -> Result<(), RunnerError> {
        self.run_until(os_signal()).await
    }

    pub async fn run_until<F>(self, stop: F) -> Result<(), RunnerError>
    where
        F: Future<Output = ()>,
    {
        let mut tasks: JoinSet<CoreExit> = JoinSet::new();
        let mut failures = Vec::new();

        for service in &self.core {
            let service = service.clone();
            let shutdown = self.shutdown.clone();
            tasks.spawn(async move {
                let name = service.name().to_string();
                info!(service = %name, "Starting core service");
                let result = service.serve(shutdown).await;
                (name, result)
            });
        }

        info!(
            core_services = self.core.len(),
            infrastructure_services = self.infrastructure.len(),
            "Runner started"
        );

        tokio::select! {
            _ = stop => {}
            Some(exit) = tasks.join_next() => {
                warn!("Core service exited before shutdown was requested");
                record_exit(exit, &mut failures);
            }
        }

        self.shutdown.shutdown();
        info!(grace_period = ?self.grace_period, "Stopping core services");

        let drained = timeout(self.grace_period, async {
            while let Some(exit) = tasks.join_next().await {
                record_exit(exit, &mut failures);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                "Grace period elapsed, aborting remaining core services"
            );
            failures.push(format!(
                "{} core service(s) did not stop within {:?}",
                tasks.len(),
                self.grace_period
            ));
            tasks.shutdown().await;
        }

        for service in &self.infrastructure {
            match service.close().await {
                Ok(()) => info!(service = service.name(), "Infrastructure service closed"),
                Err(e) => {
                    error!(service = service.name(), error = %e, "Failed to close infrastructure service");
                    failures.push(format!("{}: {e:#}", service.name()));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RunnerError::ServiceFailures(failures))
        }
    }
}

fn record_exit(exit: Result<CoreExit, JoinError>, failures: &mut Vec<String>) {
    match exit {
        Ok((name, Ok(()))) => info!(service = %name, "Core service stopped"),
        Ok((name, Err(e))) => {
            error!(service = %name, error = %format!("{e:#}"), "Core service failed");
            failures.push(format!("{name}: {e:#}"));
        }
        Err(e) => {
            error!(error = %e, "Core service task panicked");
            failures.push(format!("core service task: {e}"));
        }
    }
}
