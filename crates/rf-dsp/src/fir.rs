//! Windowed-sinc FIR octave filterbank design
//!
//! Band 0 is a lowpass at the first crossover, the top band a highpass at
//! the last one, and every band in between a bandpass built from the
//! difference of two lowpass kernels. All bands share one window, so the
//! bank sums to a unit impulse delayed by `order / 2`.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{DspError, DspResult, OctaveBands};

/// Default filter order used by the RIR renderer
pub const DEFAULT_FIR_ORDER: usize = 400;

/// Window applied to the ideal sinc kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Window {
    #[default]
    Hamming,
    Hann,
    Blackman,
    Rectangular,
}

impl Window {
    /// Window value at tap `n` of a length `len` kernel
    pub fn value(&self, n: usize, len: usize) -> f64 {
        if len <= 1 {
            return 1.0;
        }
        let x = 2.0 * PI * n as f64 / (len - 1) as f64;
        match self {
            Window::Hamming => 0.54 - 0.46 * x.cos(),
            Window::Hann => 0.5 - 0.5 * x.cos(),
            Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            Window::Rectangular => 1.0,
        }
    }
}

/// FIR octave filterbank: one kernel of `order + 1` taps per band
#[derive(Debug, Clone)]
pub struct FirFilterbank {
    order: usize,
    coeffs: Vec<Vec<f64>>,
}

impl FirFilterbank {
    /// Design a filterbank for `bands`. `order` must be even so the kernel
    /// has a centre tap.
    pub fn design(
        bands: &OctaveBands,
        order: usize,
        window: Window,
        sample_rate: f64,
    ) -> DspResult<Self> {
        if order == 0 || order % 2 != 0 {
            return Err(DspError::InvalidOrder(order));
        }
        bands.check_nyquist(sample_rate)?;

        let len = order + 1;
        let lowpasses: Vec<Vec<f64>> = bands
            .cutoffs
            .iter()
            .map(|&fc| ideal_lowpass(fc / sample_rate, order))
            .collect();

        let mut coeffs = Vec::with_capacity(bands.len());
        for band in 0..bands.len() {
            let kernel: Vec<f64> = (0..len)
                .map(|n| {
                    let upper = match lowpasses.get(band) {
                        Some(lp) => lp[n],
                        // Top band: ideal allpass (delayed impulse)
                        None => {
                            if n == order / 2 {
                                1.0
                            } else {
                                0.0
                            }
                        }
                    };
                    let lower = if band == 0 { 0.0 } else { lowpasses[band - 1][n] };
                    (upper - lower) * window.value(n, len)
                })
                .collect();
            coeffs.push(kernel);
        }

        log::debug!(
            "designed FIR octave filterbank: {} bands, order {}, {:?} window",
            coeffs.len(),
            order,
            window
        );

        Ok(Self { order, coeffs })
    }

    /// Filter order (kernel length minus one)
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Group delay of every band in samples
    #[inline]
    pub fn group_delay(&self) -> usize {
        self.order / 2
    }

    /// Number of bands
    #[inline]
    pub fn num_bands(&self) -> usize {
        self.coeffs.len()
    }

    /// Kernel for `band`
    #[inline]
    pub fn band(&self, band: usize) -> &[f64] {
        &self.coeffs[band]
    }
}

/// Ideal lowpass kernel, `fc` normalized to the sample rate
fn ideal_lowpass(fc: f64, order: usize) -> Vec<f64> {
    let centre = order as f64 / 2.0;
    (0..=order)
        .map(|n| {
            let t = n as f64 - centre;
            if t == 0.0 {
                2.0 * fc
            } else {
                (2.0 * PI * fc * t).sin() / (PI * t)
            }
        })
        .collect()
}
