pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod ingest;
pub mod metrics;
pub mod readiness;
pub mod store;
pub mod telemetry;
