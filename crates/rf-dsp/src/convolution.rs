//! Offline FFT convolution
//!
//! Full linear convolution of two real signals via `realfft`, used to
//! filter rendered impulse responses with the FIR filterbank.

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::{DspError, DspResult};

/// Below this product of lengths direct convolution is cheaper
const DIRECT_THRESHOLD: usize = 4096;

/// Reusable FFT convolver; plans are cached per FFT size
pub struct FftConvolver {
    planner: RealFftPlanner<f64>,
    fft_size: usize,
    forward: Option<Arc<dyn RealToComplex<f64>>>,
    inverse: Option<Arc<dyn ComplexToReal<f64>>>,
    time_a: Vec<f64>,
    time_b: Vec<f64>,
    spec_a: Vec<Complex<f64>>,
    spec_b: Vec<Complex<f64>>,
}

impl Default for FftConvolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FftConvolver {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
            fft_size: 0,
            forward: None,
            inverse: None,
            time_a: Vec::new(),
            time_b: Vec::new(),
            spec_a: Vec::new(),
            spec_b: Vec::new(),
        }
    }

    fn prepare(&mut self, fft_size: usize) {
        if self.fft_size == fft_size && self.forward.is_some() {
            return;
        }
        let forward = self.planner.plan_fft_forward(fft_size);
        let inverse = self.planner.plan_fft_inverse(fft_size);
        self.time_a = forward.make_input_vec();
        self.time_b = forward.make_input_vec();
        self.spec_a = forward.make_output_vec();
        self.spec_b = forward.make_output_vec();
        self.forward = Some(forward);
        self.inverse = Some(inverse);
        self.fft_size = fft_size;
    }

    /// Full linear convolution; output length is `a.len() + b.len() - 1`
    pub fn convolve(&mut self, a: &[f64], b: &[f64]) -> DspResult<Vec<f64>> {
        if a.is_empty() || b.is_empty() {
            return Ok(Vec::new());
        }
        let out_len = a.len() + b.len() - 1;
        if a.len() * b.len() <= DIRECT_THRESHOLD {
            return Ok(convolve_direct(a, b));
        }

        self.prepare(out_len.next_power_of_two());
        let (Some(forward), Some(inverse)) = (self.forward.clone(), self.inverse.clone()) else {
            return Err(DspError::Fft("planner not initialised".into()));
        };

        self.time_a.fill(0.0);
        self.time_a[..a.len()].copy_from_slice(a);
        self.time_b.fill(0.0);
        self.time_b[..b.len()].copy_from_slice(b);

        forward
            .process(&mut self.time_a, &mut self.spec_a)
            .map_err(|e| DspError::Fft(e.to_string()))?;
        forward
            .process(&mut self.time_b, &mut self.spec_b)
            .map_err(|e| DspError::Fft(e.to_string()))?;

        for (x, y) in self.spec_a.iter_mut().zip(self.spec_b.iter()) {
            *x *= *y;
        }
        // DC and Nyquist bins of a real spectrum must be purely real
        if let Some(first) = self.spec_a.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.spec_a.last_mut() {
            last.im = 0.0;
        }

        inverse
            .process(&mut self.spec_a, &mut self.time_a)
            .map_err(|e| DspError::Fft(e.to_string()))?;

        let scale = 1.0 / self.fft_size as f64;
        Ok(self.time_a[..out_len].iter().map(|v| v * scale).collect())
    }
}

/// Direct-form linear convolution
pub fn convolve_direct(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &h) in b.iter().enumerate() {
            out[i + j] += x * h;
        }
    }
    out
}
