//! Core types for the MF4 decoder library
//!
//! This module defines the values the decoder hands out to its callers: the
//! decoded [`Signal`] time series and the error type shared by every reader
//! operation.

use chrono::{DateTime, Utc};

/// Timestamp type used for absolute times (measurement start)
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// A decoded channel: physical samples with their time base
///
/// `samples` and `timestamps` always have the same length. Timestamps are
/// relative to the measurement start, in the unit of the master channel
/// (seconds for time masters).
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Channel name as stored in the file
    pub name: String,
    /// Engineering unit (e.g., "V", "°C", "A"), if the file provides one
    pub unit: Option<String>,
    /// Physical values after conversion
    pub samples: Vec<f64>,
    /// Master channel values, one per sample
    pub timestamps: Vec<f64>,
}

impl Signal {
    /// Number of samples in the signal
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the signal holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Errors that can occur while reading an MF4 file
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Not an MDF file: {0}")]
    NotMdf(String),

    #[error("Unsupported MDF version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid block at 0x{address:X}: {reason}")]
    InvalidBlock { address: u64, reason: String },

    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecoderError {
    pub(crate) fn invalid_block(address: u64, reason: impl Into<String>) -> Self {
        DecoderError::InvalidBlock {
            address,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_len() {
        let signal = Signal {
            name: "PackVolt".to_string(),
            unit: Some("V".to_string()),
            samples: vec![400.0, 401.5],
            timestamps: vec![0.0, 0.1],
        };
        assert_eq!(signal.len(), 2);
        assert!(!signal.is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = DecoderError::invalid_block(0x40, "expected ##HD");
        assert_eq!(err.to_string(), "Invalid block at 0x40: expected ##HD");
    }
}
