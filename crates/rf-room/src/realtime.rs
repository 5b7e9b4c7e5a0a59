//! Real-time early reflection renderer
//!
//! Every source keeps its own band-split history in one circular buffer
//! per octave band. A source advances by one block at a time: the block is
//! split into bands and written at the current write position, then each
//! receiver reads every image source back at its integer delay and mixes
//! it into its channels with the absorbed, directivity-weighted gain.
//!
//! Several receivers rendering the same block share one band split. A
//! source only advances again once a receiver asks for a block it has
//! already consumed.
//!
//! The taps of one band are gathered once per sample and shared by every
//! output channel, which turns the inner loop into a dense dot product.

use rf_dsp::delay::CircularBuffer;
use rf_dsp::filterbank::OctaveFilterbank;
use rf_dsp::OctaveBands;
use wide::f32x8;

use crate::echogram::Echogram;
use crate::error::{RoomError, RoomResult};

/// Integer delays and per-band gains for one pair, ready for the audio loop
#[derive(Debug, Clone, Default)]
pub struct RealtimeTaps {
    /// Delay in samples per image, ascending
    delays: Vec<usize>,
    /// `gains[band][channel][image]`
    gains: Vec<Vec<Vec<f32>>>,
}

impl RealtimeTaps {
    /// Build taps from time-sorted absorbed echograms (one per band).
    ///
    /// Fails if any delay is `capacity` samples or longer.
    pub fn from_echograms(
        absorbed: &[Echogram],
        sample_rate: f64,
        capacity: usize,
    ) -> RoomResult<Self> {
        let Some(first) = absorbed.first() else {
            return Ok(Self::default());
        };

        let delays: Vec<usize> = first
            .time
            .iter()
            .map(|t| (t * sample_rate).round() as usize)
            .collect();
        if let Some(&delay) = delays.iter().max() {
            if delay >= capacity {
                return Err(RoomError::DelayExceedsBuffer { delay, capacity });
            }
        }

        let gains = absorbed
            .iter()
            .map(|band| {
                band.value
                    .iter()
                    .map(|channel| channel.iter().map(|&v| v as f32).collect())
                    .collect()
            })
            .collect();

        Ok(Self { delays, gains })
    }

    #[inline]
    pub fn num_images(&self) -> usize {
        self.delays.len()
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.gains.first().map_or(0, Vec::len)
    }

    pub fn delays(&self) -> &[usize] {
        &self.delays
    }
}

/// Longest delay a source history of `buffer_len` can serve for blocks of
/// `block_size`, plus one.
///
/// A whole block is written before any receiver reads it, so the oldest
/// sample a block still needs must survive the rest of that block's writes.
#[inline]
pub fn delay_capacity(buffer_len: usize, block_size: usize) -> usize {
    (buffer_len + 1).saturating_sub(block_size)
}

/// Streaming state for one source
#[derive(Debug)]
pub struct SourceRenderState {
    filterbank: OctaveFilterbank,
    band_blocks: Vec<Vec<f32>>,
    silence: Vec<f32>,
    buffers: Vec<CircularBuffer>,
    /// Write position of the first sample of the current block
    block_start: usize,
    block_len: usize,
    /// Blocks written so far
    sequence: u64,
    /// Last block consumed, per receiver slot
    consumed: Vec<u64>,
}

impl SourceRenderState {
    pub fn new(
        bands: &OctaveBands,
        sample_rate: f64,
        block_size: usize,
        buffer_len: usize,
        max_receivers: usize,
    ) -> RoomResult<Self> {
        let filterbank = OctaveFilterbank::new(bands, sample_rate)?;
        let buffers = (0..bands.len())
            .map(|_| CircularBuffer::new(buffer_len))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "real-time source state: {} bands, block {}, buffer {}",
            bands.len(),
            block_size,
            buffer_len
        );

        Ok(Self {
            filterbank,
            band_blocks: vec![vec![0.0; block_size]; bands.len()],
            silence: vec![0.0; block_size],
            buffers,
            block_start: 0,
            block_len: 0,
            sequence: 0,
            consumed: vec![0; max_receivers],
        })
    }

    /// Samples written so far
    #[inline]
    pub fn write_pos(&self) -> usize {
        self.block_start.wrapping_add(self.block_len)
    }

    /// True if `receiver` has not rendered the current block yet
    #[inline]
    pub fn is_pending_for(&self, receiver: usize) -> bool {
        self.sequence > 0 && self.consumed.get(receiver).is_some_and(|&c| c != self.sequence)
    }

    /// Record that `receiver` rendered the current block
    pub fn mark_consumed(&mut self, receiver: usize) {
        if let Some(c) = self.consumed.get_mut(receiver) {
            *c = self.sequence;
        }
    }

    /// Forget what `receiver` has consumed; its slot may be reused
    pub fn release_receiver(&mut self, receiver: usize) {
        if let Some(c) = self.consumed.get_mut(receiver) {
            *c = 0;
        }
    }

    /// Split the next block into bands and append it to the history.
    ///
    /// `input` of `None` writes silence while keeping the timeline moving.
    /// `n_samples` must not exceed the configured block size.
    pub fn advance(&mut self, input: Option<&[f32]>, n_samples: usize) {
        let input = input.unwrap_or(&self.silence);
        self.filterbank.process_block(&input[..n_samples], &mut self.band_blocks);

        let start = self.write_pos();
        for (buffer, block) in self.buffers.iter_mut().zip(&self.band_blocks) {
            for (n, &sample) in block[..n_samples].iter().enumerate() {
                buffer.write(start.wrapping_add(n), sample);
            }
        }
        self.block_start = start;
        self.block_len = n_samples;
        self.sequence += 1;
    }

    /// Mix the current block, as heard through `taps`, into `output`.
    ///
    /// `scratch` must hold at least one slot per image.
    pub fn render(&self, taps: &RealtimeTaps, scratch: &mut [f32], output: &mut [Vec<f32>]) {
        let images = taps.num_images();
        if images == 0 {
            return;
        }
        let scratch = &mut scratch[..images];

        for n in 0..self.block_len {
            let pos = self.block_start.wrapping_add(n);
            for (buffer, gains) in self.buffers.iter().zip(&taps.gains) {
                for (tap, &delay) in scratch.iter_mut().zip(&taps.delays) {
                    *tap = buffer.read(pos, delay);
                }
                for (out, channel_gains) in output.iter_mut().zip(gains) {
                    out[n] += dot(channel_gains, scratch);
                }
            }
        }
    }
}

/// Dot product of two equal-length slices
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut acc = f32x8::ZERO;
    let mut lanes_a = [0.0f32; 8];
    let mut lanes_b = [0.0f32; 8];
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let tail: f32 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| x * y)
        .sum();

    for (ca, cb) in chunks_a.zip(chunks_b) {
        lanes_a.copy_from_slice(ca);
        lanes_b.copy_from_slice(cb);
        acc = f32x8::from(lanes_a).mul_add(f32x8::from(lanes_b), acc);
    }

    acc.reduce_add() + tail
}
