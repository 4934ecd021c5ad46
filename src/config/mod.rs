// src/config/mod.rs
mod models;

pub use models::*;

use config::{Environment, File};
use std::path::Path;

/// Environment variable naming an optional config file layered beneath the
/// process environment.
pub const CONFIG_PATH_VAR: &str = "CONFIG_PATH";

/// Load configuration from defaults, an optional file and the environment
pub fn load_config() -> Result<Config, ConfigError> {
    let path = std::env::var(CONFIG_PATH_VAR).ok();
    load_config_from(path.as_deref().map(Path::new), Environment::default())
}

/// Load configuration with an explicit file and environment source.
///
/// Environment keys are matched case-insensitively against the field names
/// of [`Config`], so `HTTP_SERVER_PORT` sets `http_server_port`.
pub fn load_config_from(
    path: Option<&Path>,
    environment: Environment,
) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        tracing::info!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(path).required(true));
    }

    let config: Config = builder
        .add_source(environment.ignore_empty(true))
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(source))
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = load_config_from(None, env(&[])).unwrap();
        assert_eq!(config.http_server_port, 8081);
        assert_eq!(config.metric_server_port, 8082);
        assert_eq!(config.keyval_port, 6379);
        assert_eq!(config.postgres_max_connection, 10);
        assert_eq!(config.postgres_max_connection_idle_time, Duration::from_secs(900));
        assert_eq!(config.http_body_limit, ByteSize(100 * 1024));
        assert!(!config.migration_enabled);
        assert!(config.http_skip_request_id);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = load_config_from(
            None,
            env(&[
                ("HTTP_SERVER_PORT", "9000"),
                ("HTTP_SERVER_WRITE_TIMEOUT", "250ms"),
                ("HTTP_ENABLE_CORS", "true"),
                ("HTTP_BODY_LIMIT", "2M"),
                ("KEYVAL_PASSWORD", "1234"),
                ("KEYVAL_PING_TIMEOUT", "2s"),
                ("POSTGRES_MAX_CONNECTION_IDLE_TIME", "1m"),
                ("POSTGRES_LOG_LEVEL", "DEBUG"),
                ("LOG_FORMAT", "text"),
            ]),
        )
        .unwrap();

        assert_eq!(config.http_server_port, 9000);
        assert_eq!(config.http_server_write_timeout, Duration::from_millis(250));
        assert!(config.http_enable_cors);
        assert_eq!(config.http_body_limit, ByteSize(2 * 1024 * 1024));
        assert_eq!(config.keyval_password.as_deref(), Some("1234"));
        assert_eq!(config.keyval_ping_timeout, Duration::from_secs(2));
        assert_eq!(config.postgres_max_connection_idle_time, Duration::from_secs(60));
        assert_eq!(config.postgres_log_level, PostgresLogLevel::Debug);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn numeric_looking_strings_are_kept_verbatim() {
        let config = load_config_from(
            None,
            env(&[
                ("KEYVAL_PASSWORD", "0123"),
                ("LOG_LEVEL", "TRUE"),
                ("MIGRATION_SOURCE", "1.50"),
                ("POSTGRES_URL", "postgres://app:1e5@db:5432/app"),
            ]),
        )
        .unwrap();

        assert_eq!(config.keyval_password.as_deref(), Some("0123"));
        assert_eq!(config.log_level, "TRUE");
        assert_eq!(config.migration_source, "1.50");
        assert_eq!(config.postgres_url, "postgres://app:1e5@db:5432/app");
    }

    #[test]
    fn string_values_still_feed_typed_fields() {
        let config = load_config_from(
            None,
            env(&[
                ("KEYVAL_DB", "4"),
                ("KEYVAL_POOL_SIZE", "8"),
                ("HTTP_SKIP_REQUEST_ID", "false"),
                ("HTTP_BODY_LIMIT", "2048"),
            ]),
        )
        .unwrap();

        assert_eq!(config.keyval_db, 4);
        assert_eq!(config.keyval_pool_size, 8);
        assert!(!config.http_skip_request_id);
        assert_eq!(config.http_body_limit, ByteSize(2048));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let err = load_config_from(
            None,
            env(&[("POSTGRES_MIN_CONNECTION", "50"), ("POSTGRES_MAX_CONNECTION", "5")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "POSTGRES_MIN_CONNECTION", .. }));
    }

    #[test]
    fn unparseable_duration_is_a_load_error() {
        let err = load_config_from(None, env(&[("KEYVAL_DIAL_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
