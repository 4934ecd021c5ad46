// src/main.rs
use aws_auto_app::{app, config, logging};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let dotenv = dotenvy::dotenv();

    let config = config::load_config();

    // Logging settings come from the config, so fall back to defaults when
    // it failed to load and report the failure once logging is up.
    let (level, format) = match &config {
        Ok(config) => (config.log_level.clone(), config.log_format),
        Err(_) => {
            let defaults = config::Config::default();
            (defaults.log_level, defaults.log_format)
        }
    };
    if let Err(e) = logging::init(&level, format) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to read environment file"),
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    match app::run(config).await {
        Ok(()) => {
            info!(service = app::SERVICE_NAME, "Application shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                service = app::SERVICE_NAME,
                error = %format!("{e:#}"),
                "Application exited with an error"
            );
            ExitCode::FAILURE
        }
    }
}
