//! rf-dsp: DSP building blocks for the ReelForge room simulator
//!
//! ## Modules
//! - `bands` - Octave band centre and crossover frequency tables
//! - `biquad` - TDF-II biquad filters (lowpass, highpass, allpass)
//! - `filterbank` - IIR octave-band filterbank (Linkwitz-Riley, phase compensated)
//! - `fir` - Windowed-sinc FIR octave filterbank design
//! - `convolution` - FFT linear convolution
//! - `delay` - Power-of-two circular buffer

pub mod bands;
pub mod biquad;
pub mod convolution;
pub mod delay;
pub mod filterbank;
pub mod fir;

mod error;

pub use bands::OctaveBands;
pub use error::{DspError, DspResult};

/// Type alias for audio samples used inside filters
pub type Sample = f64;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}
