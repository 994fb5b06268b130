//! SnapMatch CLI
//!
//! Command-line interface for running visual checkpoints against a
//! comparison service.

pub mod commands;
pub mod file_output;
pub mod output;
