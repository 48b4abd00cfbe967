//! Error types for the burst engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while configuring or running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid frequency.
    #[error("invalid frequency: {freq} Hz")]
    InvalidFrequency {
        /// The invalid frequency.
        freq: f64,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Error message.
        message: String,
    },

    /// No usable audio output device, or the stream could not be opened.
    #[error("audio device unavailable: {message}")]
    DeviceUnavailable {
        /// Error message from the platform layer.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates an invalid parameter error.
    pub fn invalid_param(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a device-unavailable error.
    pub fn device(message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_helper() {
        let err = EngineError::invalid_param("bandwidth", "must be between 0.1 and 4.0");
        assert!(err.to_string().contains("bandwidth"));
        assert!(err.to_string().contains("between 0.1 and 4.0"));
    }

    #[test]
    fn test_device_helper() {
        let err = EngineError::device("no default output device");
        assert!(err.to_string().contains("no default output device"));
    }
}
