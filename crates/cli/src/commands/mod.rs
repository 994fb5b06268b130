//! CLI Commands

pub mod check;
pub mod config;
