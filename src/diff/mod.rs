//! Unified diff handling.

pub mod parser;

pub use parser::{parse_unified_diff, split_file_sections, to_file_changes};
