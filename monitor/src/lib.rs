//! Twitch chat monitoring: ingestion, bounded history and live fan-out.

pub mod app;
pub mod background;
pub mod bootstrap;
pub mod config;
pub mod hub;
pub mod ingest;
pub mod shutdown;
pub mod status;

pub use app::ChatMonitor;
pub use bootstrap::{init_foundation, init_tracing};
