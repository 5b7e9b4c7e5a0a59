//! Error types for filter design and offline processing

use thiserror::Error;

/// DSP error type
#[derive(Error, Debug)]
pub enum DspError {
    #[error("Invalid band layout: {0}")]
    InvalidBands(String),

    #[error("Invalid filter order: {0}")]
    InvalidOrder(usize),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Cutoff {cutoff_hz} Hz is not below Nyquist ({nyquist_hz} Hz)")]
    CutoffAboveNyquist { cutoff_hz: f64, nyquist_hz: f64 },

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("Buffer length {0} is not a power of two")]
    NotPowerOfTwo(usize),
}

/// Result type alias
pub type DspResult<T> = Result<T, DspError>;
