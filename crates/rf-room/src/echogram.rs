//! Echogram container
//!
//! Sparse list of image-source arrivals for one source/receiver pair at one
//! processing stage.

use crate::position::Position3D;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Echogram {
    /// Arrival time per image (s)
    pub time: Vec<f64>,
    /// Magnitude per channel, per image: `value[channel][image]`
    pub value: Vec<Vec<f64>>,
    /// Signed reflection order per axis
    pub order: Vec<[i32; 3]>,
    /// Image position relative to the receiver (simulation frame)
    pub coords: Vec<Position3D>,
    /// Image indices in ascending arrival time
    pub sorted_idx: Vec<usize>,
}

impl Echogram {
    pub fn new(num_channels: usize, num_images: usize) -> Self {
        let mut echogram = Self::default();
        echogram.resize(num_channels, num_images);
        echogram
    }

    /// Reshape to `num_channels` × `num_images`. Contents are not preserved.
    pub fn resize(&mut self, num_channels: usize, num_images: usize) {
        self.time.clear();
        self.time.resize(num_images, 0.0);
        self.value.resize_with(num_channels, Vec::new);
        for channel in &mut self.value {
            channel.clear();
            channel.resize(num_images, 0.0);
        }
        self.order.clear();
        self.order.resize(num_images, [0; 3]);
        self.coords.clear();
        self.coords.resize(num_images, Position3D::origin());
        self.sorted_idx.clear();
        self.sorted_idx.extend(0..num_images);
    }

    /// Number of images
    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.value.len()
    }

    /// Rebuild `sorted_idx` with a stable ascending sort on `time`
    pub fn sort_by_time(&mut self) {
        self.sorted_idx.clear();
        self.sorted_idx.extend(0..self.time.len());
        let time = &self.time;
        self.sorted_idx.sort_by(|&a, &b| time[a].total_cmp(&time[b]));
    }

    /// True when `time` read through `sorted_idx` never decreases
    pub fn is_time_sorted(&self) -> bool {
        self.sorted_idx.len() == self.time.len()
            && self
                .sorted_idx
                .windows(2)
                .all(|w| self.time[w[0]] <= self.time[w[1]])
    }

    /// Latest arrival time, 0 when empty
    pub fn max_time(&self) -> f64 {
        self.time.iter().copied().fold(0.0, f64::max)
    }

    /// Earliest arrival
    pub fn first_arrival(&self) -> Option<f64> {
        self.sorted_idx.first().map(|&i| self.time[i])
    }
}
