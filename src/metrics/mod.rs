// src/metrics/mod.rs
mod collector;
mod server;

pub use collector::{MetricsCollector, MetricsRegistry, Timer};
pub use server::{MetricsServer, MetricsService, METRICS_PATH};
