// src/clients/keyval.rs
use super::{ClientError, PingError, Pinger};
use crate::config::KeyvalConfig;
use crate::context::RequestContext;
use crate::runner::InfrastructureService;
use async_trait::async_trait;
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config, Pool, PoolConfig, Runtime, Timeouts};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};
use url::Url;

/// Pooled Redis client.
pub struct KeyvalClient {
    pool: Pool,
    ping_timeout: Duration,
}

impl KeyvalClient {
    /// Build the pool and open `min_idle_conns` connections, each verified
    /// with a PING bounded by the ping timeout.
    pub async fn connect(config: &KeyvalConfig) -> Result<Self, ClientError> {
        let url = connection_url(config)?;

        let mut timeouts = Timeouts::default();
        timeouts.create = Some(config.dial_timeout);
        timeouts.recycle = Some(config.read_timeout);
        timeouts.wait = Some(config.write_timeout);

        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts = timeouts;

        let mut redis_config = Config::from_url(url.as_str());
        redis_config.pool = Some(pool_config);

        let client = Self {
            pool: redis_config.create_pool(Some(Runtime::Tokio1))?,
            ping_timeout: config.ping_timeout,
        };
        client.warm_up(config.min_idle_conns).await?;

        info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            pool_size = config.pool_size,
            "Redis client initialized successfully"
        );
        Ok(client)
    }

    async fn warm_up(&self, connections: usize) -> Result<(), ClientError> {
        let open = async {
            let mut held = Vec::with_capacity(connections);
            for _ in 0..connections {
                let mut conn = self
                    .pool
                    .get()
                    .await
                    .map_err(|e| ClientError::KeyvalWarmUp(e.to_string()))?;
                cmd("PING")
                    .query_async::<String>(&mut conn)
                    .await
                    .map_err(|e| ClientError::KeyvalWarmUp(e.to_string()))?;
                held.push(conn);
            }
            Ok::<_, ClientError>(held.len())
        };

        let opened = timeout(self.ping_timeout, open).await.map_err(|_| {
            ClientError::KeyvalWarmUp(format!("timed out after {:?}", self.ping_timeout))
        })??;

        debug!(connections = opened, "Redis pool warmed up");
        Ok(())
    }
}

#[async_trait]
impl Pinger for KeyvalClient {
    async fn ping(&self, ctx: &RequestContext) -> Result<(), PingError> {
        let budget = ctx.budget(self.ping_timeout);
        let probe = async {
            let mut conn = self.pool.get().await.map_err(PingError::failed)?;
            cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map_err(PingError::failed)?;
            Ok::<(), PingError>(())
        };

        timeout(budget, probe)
            .await
            .unwrap_or(Err(PingError::Timeout(budget)))
    }
}

#[async_trait]
impl InfrastructureService for KeyvalClient {
    fn name(&self) -> &str {
        "redis"
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.pool.close();
        Ok(())
    }
}

fn connection_url(config: &KeyvalConfig) -> Result<Url, ClientError> {
    let mut url = Url::parse(&format!(
        "redis://{}:{}/{}",
        config.host, config.port, config.db
    ))?;

    if let Some(password) = &config.password {
        url.set_password(Some(password)).map_err(|_| {
            ClientError::Credentials(format!("{} cannot carry a password", config.host))
        })?;
    }

    Ok(url)
}
