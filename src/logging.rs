// src/logging.rs
use crate::config::LogFormat;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Directives applied on top of the configured level.
const QUIET_CRATES: &[&str] = &["hyper=info", "sqlx=warn"];

/// Install the global tracing subscriber. `RUST_LOG`, when set, overrides
/// `level`.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for_level(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Text => builder.try_init(),
    };

    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Build a filter from a bare level such as `debug`. Unparseable levels
/// fall back to `info`.
pub fn filter_for_level(level: &str) -> EnvFilter {
    let base = match level.trim().to_ascii_lowercase().as_str() {
        lvl @ ("trace" | "debug" | "info" | "warn" | "error" | "off") => lvl.to_string(),
        _ => "info".to_string(),
    };

    QUIET_CRATES
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(EnvFilter::new(base), |filter, directive| {
            filter.add_directive(directive)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_levels_are_kept() {
        let filter = filter_for_level("DEBUG").to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("hyper=info"));
    }

    #[test]
    fn unknown_levels_fall_back_to_info() {
        let filter = filter_for_level("verbose").to_string();
        assert!(!filter.contains("verbose"));
        assert!(filter.contains("sqlx=warn"));
    }
}
