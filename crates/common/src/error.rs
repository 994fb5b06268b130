//! Error types for SnapMatch

use thiserror::Error;

/// Result type alias using SnapMatch Error
pub type Result<T> = std::result::Result<T, Error>;

/// SnapMatch error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A position query or update against the page failed.
    #[error("Driver operation failed: {0}")]
    DriverOperation(String),

    /// The remote comparison service rejected or failed a call.
    #[error("Match submission failed: {0}")]
    MatchSubmission(String),

    /// A tile could not be captured during full-page capture.
    #[error("Stitching failed at tile {tile}: {reason}")]
    Stitch { tile: usize, reason: String },

    #[error("Region out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Wrap a script failure with the name of the position operation it broke.
    pub fn driver(operation: &str, cause: impl std::fmt::Display) -> Self {
        Error::DriverOperation(format!("{}! Error: {}", operation, cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_keeps_cause() {
        let err = Error::driver("Failed to extract current scroll position", "no such window");
        let msg = err.to_string();
        assert!(msg.contains("Failed to extract current scroll position"));
        assert!(msg.contains("no such window"));
    }

    #[test]
    fn test_stitch_error_names_tile() {
        let err = Error::Stitch {
            tile: 1,
            reason: "capture refused".to_string(),
        };
        assert_eq!(err.to_string(), "Stitching failed at tile 1: capture refused");
    }
}
