//! Configuration loading and layering.
//!
//! Handles `.diffsieve.toml` loading, environment variable resolution
//! and the priority order between them.

pub mod loader;

pub use loader::{AnalysisConfig, Config, ConfigError, ProviderConfig, ReviewConfig};
