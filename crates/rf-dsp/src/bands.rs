//! Octave band frequency tables

use serde::{Deserialize, Serialize};

use crate::{DspError, DspResult};

/// Octave band layout: centre frequencies plus the crossover points between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OctaveBands {
    /// Band centre frequencies (Hz), ascending, each double the previous
    pub centres: Vec<f64>,
    /// Crossover frequencies (Hz), one fewer than the band count
    pub cutoffs: Vec<f64>,
}

impl OctaveBands {
    /// Build `num_bands` octave bands starting at `lowest_hz`.
    ///
    /// Cutoffs sit at `centre * sqrt(2)`, the upper edge of each band.
    pub fn new(lowest_hz: f64, num_bands: usize) -> DspResult<Self> {
        if num_bands < 2 {
            return Err(DspError::InvalidBands(format!(
                "at least 2 bands required, got {num_bands}"
            )));
        }
        if !(lowest_hz > 0.0) {
            return Err(DspError::InvalidBands(format!(
                "lowest band must be positive, got {lowest_hz}"
            )));
        }

        let centres: Vec<f64> = (0..num_bands)
            .map(|b| lowest_hz * 2.0_f64.powi(b as i32))
            .collect();
        let cutoffs = centres[..num_bands - 1]
            .iter()
            .map(|c| c * std::f64::consts::SQRT_2)
            .collect();

        Ok(Self { centres, cutoffs })
    }

    /// Number of bands
    #[inline]
    pub fn len(&self) -> usize {
        self.centres.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }

    /// Highest crossover frequency
    pub fn highest_cutoff(&self) -> f64 {
        self.cutoffs.last().copied().unwrap_or(0.0)
    }

    /// Check every crossover sits below Nyquist
    pub fn check_nyquist(&self, sample_rate: f64) -> DspResult<()> {
        if !(sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        let nyquist_hz = sample_rate / 2.0;
        let cutoff_hz = self.highest_cutoff();
        if cutoff_hz >= nyquist_hz {
            return Err(DspError::CutoffAboveNyquist {
                cutoff_hz,
                nyquist_hz,
            });
        }
        Ok(())
    }
}
