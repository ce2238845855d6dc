//! # Error Types
//!
//! Custom error types for Pad Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Pad Bridge
#[derive(Debug, Error)]
pub enum PadBridgeError {
    /// Profile values that cannot be used even after falling back to defaults
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML profile parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML profile serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON profile parsing and serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Controller input errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No supported controller is connected
    #[error("No supported controller found")]
    ControllerNotFound,

    /// Virtual joystick errors
    #[error("Virtual device error: {0}")]
    Device(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Pad Bridge
pub type Result<T> = std::result::Result<T, PadBridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PadBridgeError::Config("update_rate must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: update_rate must be positive"
        );
        assert_eq!(
            PadBridgeError::ControllerNotFound.to_string(),
            "No supported controller found"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PadBridgeError = io.into();
        assert!(matches!(err, PadBridgeError::Io(_)));
    }
}
