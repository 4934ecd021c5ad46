// src/runner/shutdown.rs
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Process-wide stop flag shared by every core service.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `shutdown` has been called, including calls made
    /// before this future was created.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// A token that is canceled together with this signal.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn os_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
