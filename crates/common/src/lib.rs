//! SnapMatch Common Library
//!
//! Geometry, the comparison-service data model, the error taxonomy and the
//! script-executor contract shared by the engine and the CLI.

pub mod error;
pub mod executor;
pub mod geometry;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use executor::ScriptExecutor;
pub use geometry::{Location, RectangleSize, Region};
pub use types::*;

/// SnapMatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".snapmatch")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
