//! Error types for the shoebox room engine

use thiserror::Error;

/// Room simulation error types
#[derive(Error, Debug)]
pub enum RoomError {
    /// Unknown source or receiver ID
    #[error("Invalid {kind} handle: {id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    /// Registry is full
    #[error("Maximum {kind} count exceeded: {max}")]
    CapacityExceeded { kind: &'static str, max: usize },

    /// Room configuration rejected by validation
    #[error("Invalid room configuration: {0}")]
    InvalidConfig(String),

    /// Position outside the room or not finite
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Invalid spherical harmonic order
    #[error("Invalid spherical harmonic order: {0} (max supported: {max})", max = crate::MAX_SH_ORDER)]
    InvalidShOrder(usize),

    /// Echogram bound must be positive
    #[error("Invalid echogram bound: {0}")]
    InvalidBound(String),

    /// Invalid channel count
    #[error("Invalid channel count: expected {expected}, got {got}")]
    InvalidChannelCount { expected: usize, got: usize },

    /// Buffer size mismatch
    #[error("Buffer size mismatch: expected {expected}, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },

    /// Image source delay does not fit in the circular buffer
    #[error("Reflection delay of {delay} samples does not fit circular buffer of {capacity}")]
    DelayExceedsBuffer { delay: usize, capacity: usize },

    /// Requested feature path is not implemented
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    /// Filter design or FFT failure
    #[error("DSP error: {0}")]
    Dsp(#[from] rf_dsp::DspError),

    /// Configuration parse error
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for room operations
pub type RoomResult<T> = Result<T, RoomError>;
