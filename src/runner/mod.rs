// src/runner/mod.rs
mod runner;
mod service;
mod shutdown;

pub use runner::{Runner, RunnerError};
pub use service::{CoreService, InfrastructureService};
pub use shutdown::{os_signal, ShutdownSignal};
