pub mod build_id;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod types;
pub mod validation;

// Use cases and the ports they depend on
pub mod app;
// Adapters for the broker and the status store
pub mod infra;
