// src/clients/ping.rs
use crate::context::{ContextError, RequestContext};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PingError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("ping timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),
}

impl PingError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        PingError::Failed(err.to_string())
    }
}

/// Liveness probe for a backing store.
///
/// Implementations must return promptly once `ctx` is canceled or its
/// deadline passes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, ctx: &RequestContext) -> Result<(), PingError>;
}
