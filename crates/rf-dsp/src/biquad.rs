//! Biquad filter implementation using Transposed Direct Form II
//!
//! Only the responses the octave filterbank needs are provided:
//! Butterworth lowpass/highpass sections and the matching second-order
//! allpass used for crossover phase compensation.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use crate::{MonoProcessor, Processor, Sample};

/// Q of a second-order Butterworth section
pub const BUTTERWORTH_Q: f64 = FRAC_1_SQRT_2;

/// Biquad coefficients, normalized so that a0 == 1
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Shared bilinear-transform terms for a given corner frequency
struct Prewarp {
    cos_omega: f64,
    alpha: f64,
}

impl Prewarp {
    fn new(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        Self {
            cos_omega: omega.cos(),
            alpha: omega.sin() / (2.0 * q),
        }
    }

    fn normalize(&self, b0: f64, b1: f64, b2: f64) -> BiquadCoeffs {
        let a0 = 1.0 + self.alpha;
        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * self.cos_omega / a0,
            a2: (1.0 - self.alpha) / a0,
        }
    }
}

impl BiquadCoeffs {
    /// Lowpass section
    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prewarp::new(freq, q, sample_rate);
        let b1 = 1.0 - p.cos_omega;
        p.normalize(b1 / 2.0, b1, b1 / 2.0)
    }

    /// Highpass section
    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prewarp::new(freq, q, sample_rate);
        let b1 = 1.0 + p.cos_omega;
        p.normalize(b1 / 2.0, -b1, b1 / 2.0)
    }

    /// Second-order allpass section
    pub fn allpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let p = Prewarp::new(freq, q, sample_rate);
        p.normalize(1.0 - p.alpha, -2.0 * p.cos_omega, 1.0 + p.alpha)
    }

    /// Bypass (unity gain, no filtering)
    pub fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

/// Transposed Direct Form II biquad filter
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
    sample_rate: f64,
}

impl BiquadTDF2 {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_coeffs(BiquadCoeffs::bypass(), sample_rate)
    }

    pub fn with_coeffs(coeffs: BiquadCoeffs, sample_rate: f64) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        }
    }

    pub fn set_lowpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::lowpass(freq, q, self.sample_rate);
    }

    pub fn set_highpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::highpass(freq, q, self.sample_rate);
    }

    pub fn set_allpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::allpass(freq, q, self.sample_rate);
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }
}
