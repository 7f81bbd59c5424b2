//! diffsieve: multi-stage LLM code review (library crate).
//!
//! A review runs a change through size estimation, context assembly, a
//! concurrent static/intent analysis fan-out, result combination and a
//! bounded synthesis loop. Re-exports public modules for integration tests
//! and external use.

pub mod analysis;
pub mod budget;
pub mod combiner;
pub mod config;
pub mod constants;
pub mod context;
pub mod decode;
pub mod diff;
pub mod env;
pub mod intent;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod providers;
pub mod sizing;
pub mod source;
pub mod synthesis;
