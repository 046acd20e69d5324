//! Custom error types for the Galahad II LCD driver.
//!
//! This module provides fine-grained error handling for device communication,
//! frame rendering, encoding, and configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Galahad LCD operations.
#[derive(Error, Debug)]
pub enum GalahadError {
    /// Device not found during enumeration.
    #[error("Galahad II LCD not found. Check USB connection and permissions.")]
    DeviceNotFound,

    /// Control interface could not be claimed.
    #[error("Interface {0} not available (is another program holding it?)")]
    InterfaceNotAvailable(u8),

    /// No bulk OUT endpoint on the control interface.
    #[error("No bulk OUT endpoint on interface {0}")]
    EndpointNotFound(u8),

    /// Low-level USB error.
    #[error("USB error: {0}")]
    Usb(#[from] std::io::Error),

    /// A bulk transfer completed with an error.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// A bulk write did not complete in time.
    #[error("USB write timed out after {0} ms")]
    WriteTimeout(u64),

    /// Background image could not be loaded.
    #[error("Failed to load background '{}': {message}", path.display())]
    Background { path: PathBuf, message: String },

    /// Encoder could not be set up.
    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// Encoding one frame failed.
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Attempted to frame a zero-length payload.
    #[error("Encoded payload is empty")]
    EmptyPayload,

    /// Payload length does not fit the 4-byte length field.
    #[error("Encoded payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Config file could not be read or written.
    #[error("Config file error at '{}': {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The frame loop gave up.
    #[error("Stopping after {0} consecutive failed frames")]
    TooManyFailures(u32),

    /// Generic invalid input error.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Galahad operations.
pub type Result<T> = std::result::Result<T, GalahadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_error_names_path() {
        let err = GalahadError::Background {
            path: PathBuf::from("/tmp/missing.png"),
            message: "No such file".into(),
        };
        let text = err.to_string();
        assert!(text.contains("/tmp/missing.png"));
        assert!(text.contains("No such file"));
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(
            GalahadError::WriteTimeout(2000).to_string(),
            "USB write timed out after 2000 ms"
        );
    }
}
