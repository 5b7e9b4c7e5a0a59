//! Power-of-two circular buffer
//!
//! Fixed-length ring storage with masked indexing. The caller owns the
//! write position so several buffers can share one timeline.

use crate::{DspError, DspResult};

#[derive(Debug, Clone)]
pub struct CircularBuffer {
    buffer: Vec<f32>,
    mask: usize,
}

impl CircularBuffer {
    /// Allocate a zeroed buffer; `len` must be a power of two
    pub fn new(len: usize) -> DspResult<Self> {
        if len == 0 || !len.is_power_of_two() {
            return Err(DspError::NotPowerOfTwo(len));
        }
        Ok(Self {
            buffer: vec![0.0; len],
            mask: len - 1,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Largest delay that can be read back without wrapping
    #[inline]
    pub fn max_delay(&self) -> usize {
        self.mask
    }

    #[inline(always)]
    pub fn write(&mut self, pos: usize, value: f32) {
        self.buffer[pos & self.mask] = value;
    }

    /// Sample written `delay` steps before `pos`
    #[inline(always)]
    pub fn read(&self, pos: usize, delay: usize) -> f32 {
        self.buffer[pos.wrapping_sub(delay) & self.mask]
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}
