// src/server/mod.rs
pub mod builder;
pub mod handler;
pub mod listener;
pub mod response;

pub use builder::{HttpServer, ServerBuilder};
pub use handler::{HandlerSettings, RequestHandler, HEALTH_PATH, REQUEST_ID_HEADER};
pub use response::ApiError;
