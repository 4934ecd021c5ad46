// src/clients/mod.rs
mod keyval;
mod ping;
mod postgres;

pub use keyval::KeyvalClient;
pub use ping::{PingError, Pinger};
#[cfg(test)]
pub use ping::MockPinger;
pub use postgres::{migrate_up, PostgresClient};

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid keyval address: {0}")]
    Address(#[from] url::ParseError),

    #[error("invalid keyval credentials: {0}")]
    Credentials(String),

    #[error("failed to build keyval pool: {0}")]
    KeyvalPool(#[from] deadpool_redis::CreatePoolError),

    #[error("keyval warm-up failed: {0}")]
    KeyvalWarmUp(String),

    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
