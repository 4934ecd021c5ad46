// src/runner/service.rs
use super::ShutdownSignal;
use async_trait::async_trait;

/// A long-running service that owns a listening socket. `serve` returns once
/// the shutdown signal fires and in-flight work has drained.
#[async_trait]
pub trait CoreService: Send + Sync {
    fn name(&self) -> &str;

    async fn serve(&self, shutdown: ShutdownSignal) -> anyhow::Result<()>;
}

/// A dependency that is released after every core service has stopped.
#[async_trait]
pub trait InfrastructureService: Send + Sync {
    fn name(&self) -> &str;

    async fn close(&self) -> anyhow::Result<()>;
}
