//! HTTP surface for the profiler

pub mod routes;
pub mod server;

pub use routes::{ApiError, ErrorResponse};
pub use server::{ApiServer, ApiServerConfig};
