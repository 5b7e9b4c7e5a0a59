//! IIR octave-band filterbank
//!
//! Splits a mono signal into octave bands with a tree of Linkwitz-Riley
//! 24 dB/oct crossovers. Each lower band is passed through the allpass
//! equivalent of every crossover above it, so the bands sum to an allpass
//! version of the input (flat magnitude, coherent phase).

use crate::biquad::{BiquadCoeffs, BiquadTDF2, BUTTERWORTH_Q};
use crate::{DspError, DspResult, MonoProcessor, OctaveBands, Processor, Sample};

/// Linkwitz-Riley 4th order section: two cascaded Butterworth biquads
#[derive(Debug, Clone)]
struct LinkwitzRiley4 {
    stages: [BiquadTDF2; 2],
}

impl LinkwitzRiley4 {
    fn lowpass(freq: f64, sample_rate: f64) -> Self {
        let coeffs = BiquadCoeffs::lowpass(freq, BUTTERWORTH_Q, sample_rate);
        Self::from_coeffs(coeffs, sample_rate)
    }

    fn highpass(freq: f64, sample_rate: f64) -> Self {
        let coeffs = BiquadCoeffs::highpass(freq, BUTTERWORTH_Q, sample_rate);
        Self::from_coeffs(coeffs, sample_rate)
    }

    fn from_coeffs(coeffs: BiquadCoeffs, sample_rate: f64) -> Self {
        Self {
            stages: [
                BiquadTDF2::with_coeffs(coeffs, sample_rate),
                BiquadTDF2::with_coeffs(coeffs, sample_rate),
            ],
        }
    }

    #[inline]
    fn process(&mut self, input: Sample) -> Sample {
        let mid = self.stages[0].process_sample(input);
        self.stages[1].process_sample(mid)
    }

    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

/// Octave-band IIR filterbank for block-based real-time processing
#[derive(Debug, Clone)]
pub struct OctaveFilterbank {
    lowpass: Vec<LinkwitzRiley4>,
    highpass: Vec<LinkwitzRiley4>,
    /// Allpass chain per band (empty for the top two bands)
    compensation: Vec<Vec<BiquadTDF2>>,
    num_bands: usize,
}

impl OctaveFilterbank {
    /// Create a filterbank splitting at the crossovers of `bands`
    pub fn new(bands: &OctaveBands, sample_rate: f64) -> DspResult<Self> {
        bands.check_nyquist(sample_rate)?;
        if bands.len() > MAX_BANDS {
            return Err(DspError::InvalidBands(format!(
                "{} bands exceeds the filterbank limit of {MAX_BANDS}",
                bands.len()
            )));
        }

        let cutoffs = &bands.cutoffs;
        let lowpass = cutoffs
            .iter()
            .map(|&fc| LinkwitzRiley4::lowpass(fc, sample_rate))
            .collect();
        let highpass = cutoffs
            .iter()
            .map(|&fc| LinkwitzRiley4::highpass(fc, sample_rate))
            .collect();

        let compensation = (0..bands.len())
            .map(|band| {
                cutoffs
                    .iter()
                    .skip(band + 1)
                    .map(|&fc| {
                        BiquadTDF2::with_coeffs(
                            BiquadCoeffs::allpass(fc, BUTTERWORTH_Q, sample_rate),
                            sample_rate,
                        )
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            lowpass,
            highpass,
            compensation,
            num_bands: bands.len(),
        })
    }

    /// Number of output bands
    #[inline]
    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Split one sample; `out` receives one value per band
    #[inline]
    pub fn process_sample(&mut self, input: Sample, out: &mut [Sample]) {
        debug_assert!(out.len() >= self.num_bands);

        let mut remaining = input;
        for band in 0..self.num_bands - 1 {
            let mut low = self.lowpass[band].process(remaining);
            for ap in &mut self.compensation[band] {
                low = ap.process_sample(low);
            }
            out[band] = low;
            remaining = self.highpass[band].process(remaining);
        }
        out[self.num_bands - 1] = remaining;
    }

    /// Split a block of `f32` audio into per-band blocks.
    ///
    /// `bands[b]` must hold at least `input.len()` samples.
    pub fn process_block(&mut self, input: &[f32], bands: &mut [Vec<f32>]) {
        debug_assert!(bands.len() >= self.num_bands);

        let mut split = [0.0 as Sample; MAX_BANDS];
        for (n, &x) in input.iter().enumerate() {
            self.process_sample(x as Sample, &mut split[..self.num_bands]);
            for (band, value) in bands.iter_mut().zip(split.iter()).take(self.num_bands) {
                band[n] = *value as f32;
            }
        }
    }
}

/// Upper bound on bands handled by the stack scratch in `process_block`
pub const MAX_BANDS: usize = 16;

impl Processor for OctaveFilterbank {
    fn reset(&mut self) {
        for f in self.lowpass.iter_mut().chain(self.highpass.iter_mut()) {
            f.reset();
        }
        for ap in self.compensation.iter_mut().flatten() {
            ap.reset();
        }
    }
}
