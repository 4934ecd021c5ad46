// src/app.rs
use crate::clients::{migrate_up, KeyvalClient, Pinger, PostgresClient};
use crate::config::Config;
use crate::health::HealthHandler;
use crate::metrics::{MetricsRegistry, MetricsServer};
use crate::runner::{InfrastructureService, Runner};
use crate::server::{HandlerSettings, RequestHandler, ServerBuilder};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub const SERVICE_NAME: &str = "aws-auto-app";

/// Connect dependencies, assemble every service and run until shutdown.
pub async fn run(config: Config) -> Result<()> {
    info!(service = SERVICE_NAME, "Starting application");

    let migration = config.migration();
    if migration.enabled {
        migrate_up(&config.postgres(), &migration)
            .await
            .context("failed to run database migrations")?;
    }

    let postgres = Arc::new(
        PostgresClient::connect(&config.postgres())
            .await
            .context("failed to connect to postgres")?,
    );
    let keyval = Arc::new(
        KeyvalClient::connect(&config.keyval())
            .await
            .context("failed to connect to redis")?,
    );

    let runner = assemble(&config, keyval, postgres)?;
    runner.run().await?;
    Ok(())
}

/// Wire the HTTP and metrics servers around already connected clients.
/// Each client is registered once as infrastructure, postgres first.
pub fn assemble<K, P>(config: &Config, keyval: Arc<K>, postgres: Arc<P>) -> Result<Runner>
where
    K: Pinger + InfrastructureService + 'static,
    P: Pinger + InfrastructureService + 'static,
{
    let registry = Arc::new(MetricsRegistry::new()?);
    let health = HealthHandler::new(keyval.clone(), postgres.clone());

    let runner = Runner::new(config.graceful_shutdown_period);

    let http_config = config.http_server();
    let handler = RequestHandler::new(
        health,
        registry.collector(),
        HandlerSettings::from(&http_config),
        runner.shutdown_signal(),
    );
    let http_server = ServerBuilder::new(http_config)
        .with_handler(handler)
        .build()?;
    let metrics_server = MetricsServer::new(config.metric_server(), registry);

    Ok(runner
        .with_core_service(Arc::new(metrics_server))
        .with_core_service(Arc::new(http_server))
        .with_infrastructure_service(postgres)
        .with_infrastructure_service(keyval))
}
