//! Error types for emulator operations

use thiserror::Error;

/// Result type alias for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors that can occur while configuring buffers or evaluating layers
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// Hardware configuration is zero or inconsistent with the layer
    #[error("Invalid hardware configuration: {reason}")]
    Configuration {
        /// Reason for failure
        reason: String,
    },

    /// Buffer reservation failed
    #[error("Buffer allocation failed: {reason}")]
    Allocation {
        /// Reason for failure
        reason: String,
    },

    /// Allocate/release called out of order
    #[error("Buffer lifecycle violation: {reason}")]
    BufferLifecycle {
        /// Reason for failure
        reason: String,
    },

    /// Layer-type tag matched neither known variant
    #[error("Unrecognized layer type tag {tag:#04x}")]
    UnrecognizedLayerType {
        /// Raw tag value
        tag: u8,
    },

    /// Layer dimensions are inconsistent
    #[error("Invalid layer: {reason}")]
    InvalidLayer {
        /// Reason for failure
        reason: String,
    },

    /// Tensor data length does not match its shape
    #[error("Tensor shape mismatch: shape holds {expected} elements, data has {actual}")]
    ShapeMismatch {
        /// Element count implied by the shape
        expected: usize,
        /// Element count supplied
        actual: usize,
    },
}

impl EmulatorError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an allocation error
    pub fn allocation(reason: impl Into<String>) -> Self {
        Self::Allocation {
            reason: reason.into(),
        }
    }

    /// Create a buffer lifecycle error
    pub fn lifecycle(reason: impl Into<String>) -> Self {
        Self::BufferLifecycle {
            reason: reason.into(),
        }
    }

    /// Create an invalid layer error
    pub fn invalid_layer(reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            reason: reason.into(),
        }
    }
}
