//! Room impulse response rendering
//!
//! Each band's absorbed echogram is discretized onto the sample grid,
//! filtered by the matching FIR band and summed. The FIR group delay is
//! removed so every arrival peaks on its own sample bin.

use rf_dsp::convolution::FftConvolver;
use rf_dsp::fir::FirFilterbank;

use crate::echogram::Echogram;
use crate::error::RoomResult;

/// Multi-channel impulse response for one (receiver, source) pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rir {
    /// `data[channel][sample]`
    pub data: Vec<Vec<f32>>,
}

impl Rir {
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.data.len()
    }

    /// Length in samples
    #[inline]
    pub fn len(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.data[channel]
    }

    /// Reshape and zero; storage is reallocated only when the shape changes
    fn reset(&mut self, num_channels: usize, len: usize) {
        if self.num_channels() != num_channels || self.len() != len {
            self.data = vec![vec![0.0; len]; num_channels];
        } else {
            for channel in &mut self.data {
                channel.fill(0.0);
            }
        }
    }
}

/// Sample bin for an arrival time
#[inline]
pub fn arrival_bin(time: f64, sample_rate: f64) -> usize {
    (time * sample_rate).round() as usize
}

/// Add every image of `echogram` at its nearest sample bin.
///
/// `out[channel]` must be long enough for the latest arrival.
pub fn discretize(echogram: &Echogram, sample_rate: f64, out: &mut [Vec<f64>]) {
    for (n, &time) in echogram.time.iter().enumerate() {
        let bin = arrival_bin(time, sample_rate);
        for (channel, values) in out.iter_mut().zip(&echogram.value) {
            channel[bin] += values[n];
        }
    }
}

/// Offline renderer owning the FIR bank and FFT plans
pub struct RirRenderer {
    fir: FirFilterbank,
    convolver: FftConvolver,
    sample_rate: f64,
    band_buffer: Vec<Vec<f64>>,
    mix: Vec<Vec<f64>>,
}

impl RirRenderer {
    pub fn new(fir: FirFilterbank, sample_rate: f64) -> Self {
        Self {
            fir,
            convolver: FftConvolver::new(),
            sample_rate,
            band_buffer: Vec::new(),
            mix: Vec::new(),
        }
    }

    /// RIR length for echograms whose latest arrival is `max_time`
    pub fn rir_len(&self, max_time: f64) -> usize {
        arrival_bin(max_time, self.sample_rate) + 1 + self.fir.group_delay()
    }

    /// Render per-band absorbed echograms into `rir`
    pub fn render(&mut self, absorbed: &[Echogram], rir: &mut Rir) -> RoomResult<()> {
        let num_channels = absorbed.first().map_or(0, Echogram::num_channels);
        let max_time = absorbed.iter().map(Echogram::max_time).fold(0.0, f64::max);
        let bins = arrival_bin(max_time, self.sample_rate) + 1;
        let len = self.rir_len(max_time);
        let delay = self.fir.group_delay();

        resize_zeroed(&mut self.mix, num_channels, len);
        resize_zeroed(&mut self.band_buffer, num_channels, bins);

        for (band, echogram) in absorbed.iter().enumerate().take(self.fir.num_bands()) {
            for channel in &mut self.band_buffer {
                channel.fill(0.0);
            }
            discretize(echogram, self.sample_rate, &mut self.band_buffer);

            for (channel, mix) in self.band_buffer.iter().zip(self.mix.iter_mut()) {
                if channel.iter().all(|v| *v == 0.0) {
                    continue;
                }
                let filtered = self.convolver.convolve(channel, self.fir.band(band))?;
                for (m, f) in mix.iter_mut().zip(filtered.iter().skip(delay)) {
                    *m += f;
                }
            }
        }

        rir.reset(num_channels, len);
        for (out, mix) in rir.data.iter_mut().zip(&self.mix) {
            for (o, m) in out.iter_mut().zip(mix) {
                *o = *m as f32;
            }
        }
        Ok(())
    }
}

fn resize_zeroed(buffers: &mut Vec<Vec<f64>>, num_channels: usize, len: usize) {
    buffers.resize_with(num_channels, Vec::new);
    for buffer in buffers.iter_mut() {
        buffer.clear();
        buffer.resize(len, 0.0);
    }
}
