//! Receiver directivity - omnidirectional echogram to receiver channels

use serde::{Deserialize, Serialize};

use crate::echogram::Echogram;
use crate::error::{RoomError, RoomResult};
use crate::harmonics::{Normalization, SphericalHarmonics, channel_count};
use crate::MAX_SH_ORDER;

/// Receiver pickup pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverDirectivity {
    /// Spherical harmonic microphone of the given order, (order+1)² channels
    SphericalHarmonic { order: usize },
}

impl ReceiverDirectivity {
    pub fn spherical_harmonic(order: usize) -> RoomResult<Self> {
        if order > MAX_SH_ORDER {
            return Err(RoomError::InvalidShOrder(order));
        }
        Ok(Self::SphericalHarmonic { order })
    }

    /// Number of output channels
    pub fn channel_count(&self) -> usize {
        match *self {
            ReceiverDirectivity::SphericalHarmonic { order } => channel_count(order),
        }
    }

    pub fn encoder(&self, normalization: Normalization) -> RoomResult<DirectivityEncoder> {
        match *self {
            ReceiverDirectivity::SphericalHarmonic { order } => Ok(DirectivityEncoder {
                sh: SphericalHarmonics::new(order, normalization)?,
            }),
        }
    }
}

/// Projects raw echograms onto a receiver's channels
#[derive(Debug, Clone)]
pub struct DirectivityEncoder {
    sh: SphericalHarmonics,
}

impl DirectivityEncoder {
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.sh.channel_count()
    }

    /// Encode `raw` (one channel) into `out`, stored in ascending time order.
    ///
    /// The permutation of `out` is the identity afterwards.
    pub fn encode(&mut self, raw: &Echogram, out: &mut Echogram) {
        let channels = self.channel_count();
        out.resize(channels, raw.len());

        for (n, &src) in raw.sorted_idx.iter().enumerate() {
            out.time[n] = raw.time[src];
            out.order[n] = raw.order[src];
            out.coords[n] = raw.coords[src];

            let magnitude = raw.value[0][src];
            if channels == 1 {
                out.value[0][n] = magnitude;
                continue;
            }

            let dir = raw.coords[src].to_spherical();
            let weights = self.sh.compute_for_direction(dir.azimuth, dir.elevation);
            for (channel, weight) in out.value.iter_mut().zip(weights) {
                channel[n] = magnitude * *weight as f64;
            }
        }
    }
}
