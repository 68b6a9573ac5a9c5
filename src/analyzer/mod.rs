//! Analyzer module for saved event logs.
//!
//! Provides functionality for:
//! - Parsing rendered event log lines back into entries
//! - Reconstructing per-drone counts and checking protocol rules

pub mod log_loader;
pub mod log_parser;
pub mod report;
pub mod types;

pub use log_loader::load_log_file;
pub use report::analyze;
