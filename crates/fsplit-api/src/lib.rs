//! Axum HTTP endpoint adapter.
//!
//! Exposes the ingestion pipeline over a single POST route and maps
//! outcomes to transport status: success and malformed input are
//! acknowledged so the relay stops redelivering, everything else is
//! signalled retryable.

pub mod alert;
pub mod config;
pub mod handlers;
pub mod routes;
pub mod state;

pub use alert::NoFramesAlert;
pub use config::ApiConfig;
pub use routes::create_router;
pub use state::AppState;
