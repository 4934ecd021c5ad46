// src/clients/postgres.rs
use super::{ClientError, PingError, Pinger};
use crate::config::{MigrationConfig, PostgresConfig};
use crate::context::RequestContext;
use crate::runner::InfrastructureService;
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, PgConnection, PgPool};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// Pooled PostgreSQL client.
pub struct PostgresClient {
    pool: PgPool,
    ping_timeout: Duration,
}

impl PostgresClient {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, ClientError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(Some(config.max_idle_time))
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options(config)?)
            .await?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "PostgreSQL client initialized successfully"
        );

        Ok(Self {
            pool,
            ping_timeout: config.connect_timeout,
        })
    }
}

fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions, ClientError> {
    Ok(PgConnectOptions::from_str(&config.url)?.log_statements(config.log_level.into()))
}

/// Apply pending migrations from the configured source on a dedicated
/// connection. Runs before the pool is built.
pub async fn migrate_up(
    config: &PostgresConfig,
    migration: &MigrationConfig,
) -> Result<(), ClientError> {
    let path = migration.path()?;
    info!(source = %migration.source, "Starting database migration process...");

    let migrator = Migrator::new(path).await?;
    let mut conn = PgConnection::connect_with(&connect_options(config)?).await?;
    migrator.run(&mut conn).await?;
    conn.close().await?;

    info!(
        migrations = migrator.iter().count(),
        "Database migration process completed successfully"
    );
    Ok(())
}

#[async_trait]
impl Pinger for PostgresClient {
    async fn ping(&self, ctx: &RequestContext) -> Result<(), PingError> {
        let budget = ctx.budget(self.ping_timeout);
        let probe = async {
            let mut conn = self.pool.acquire().await.map_err(PingError::failed)?;
            conn.ping().await.map_err(PingError::failed)?;
            Ok::<(), PingError>(())
        };

        timeout(budget, probe)
            .await
            .unwrap_or(Err(PingError::Timeout(budget)))
    }
}

#[async_trait]
impl InfrastructureService for PostgresClient {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
