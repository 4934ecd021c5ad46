// src/lib.rs
pub mod app;
pub mod clients;
pub mod config;
pub mod context;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod server;
