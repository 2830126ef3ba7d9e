//! # pousse-api
//!
//! Thin HTTP adapter over the poussetaches engine: JSON routes for
//! submitting tasks, inspecting the three buckets, pausing/resuming
//! deliveries, and clearing cron state.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use routes::api_router;
pub use server::ServerConfig;
