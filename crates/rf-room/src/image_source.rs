//! Image-source geometry engine
//!
//! Enumerates mirror images of a source on the integer lattice of room
//! reflections. Along one axis the image with index `i` sits at
//! `i * dim + (-1)^i * src`, so the vector from the receiver to the image is
//! `i * dim + (-1)^i * src - rcv` with source and receiver expressed in the
//! centred simulation frame.

use serde::{Deserialize, Serialize};

use crate::echogram::Echogram;
use crate::error::{RoomError, RoomResult};
use crate::position::Position3D;

/// Cutoff for image enumeration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EchogramBound {
    /// Keep images arriving before this time (s)
    MaxTime(f64),
    /// Keep images with at most this many reflections in total
    MaxOrder(u32),
}

impl EchogramBound {
    pub fn validate(&self) -> RoomResult<()> {
        match *self {
            EchogramBound::MaxTime(t) if t > 0.0 && t.is_finite() => Ok(()),
            EchogramBound::MaxOrder(o) if o > 0 => Ok(()),
            other => Err(RoomError::InvalidBound(format!("{other:?}"))),
        }
    }
}

/// Room and endpoint positions for one source/receiver pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairGeometry {
    pub dimensions: [f64; 3],
    /// Source in room coordinates
    pub source: Position3D,
    /// Receiver in room coordinates
    pub receiver: Position3D,
    pub speed_of_sound: f64,
}

/// Magnitude of an arrival at `distance`: 1/d, clamped to 1 inside a metre
#[inline]
pub fn distance_gain(distance: f64) -> f64 {
    if distance <= 1.0 { 1.0 } else { 1.0 / distance }
}

/// Lattice of candidate reflection indices, kept between calls.
///
/// The candidate set depends only on the bound and the room dimensions,
/// so moving a source or receiver reuses it.
#[derive(Debug, Clone, Default)]
pub struct LatticeCache {
    key: Option<(EchogramBound, [f64; 3], f64)>,
    indices: Vec<[i32; 3]>,
    kept: Vec<([i32; 3], Position3D, f64)>,
}

impl LatticeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate index triples for the current key
    pub fn indices(&self) -> &[[i32; 3]] {
        &self.indices
    }

    fn prepare(&mut self, bound: EchogramBound, dims: [f64; 3], speed_of_sound: f64) {
        let key = (bound, dims, speed_of_sound);
        if self.key == Some(key) {
            return;
        }

        self.indices.clear();
        match bound {
            EchogramBound::MaxTime(t) => {
                let max_distance = t * speed_of_sound;
                let n = dims.map(|d| (max_distance / d).ceil() as i32);
                for i in -n[0]..=n[0] {
                    for j in -n[1]..=n[1] {
                        for k in -n[2]..=n[2] {
                            self.indices.push([i, j, k]);
                        }
                    }
                }
            }
            EchogramBound::MaxOrder(order) => {
                let n = order as i32;
                for i in -n..=n {
                    for j in -n..=n {
                        for k in -n..=n {
                            if i.abs() + j.abs() + k.abs() <= n {
                                self.indices.push([i, j, k]);
                            }
                        }
                    }
                }
            }
        }
        self.key = Some(key);
    }
}

/// Fill `out` with the single-channel raw echogram for `geometry`.
pub fn compute_image_sources(
    geometry: &PairGeometry,
    bound: EchogramBound,
    cache: &mut LatticeCache,
    out: &mut Echogram,
) -> RoomResult<()> {
    bound.validate()?;

    let dims = geometry.dimensions;
    let c = geometry.speed_of_sound;
    let src = geometry.source.to_simulation_frame(&dims).to_array();
    let rcv = geometry.receiver.to_simulation_frame(&dims).to_array();
    let max_distance = match bound {
        EchogramBound::MaxTime(t) => Some(t * c),
        EchogramBound::MaxOrder(_) => None,
    };

    cache.prepare(bound, dims, c);
    let LatticeCache { indices, kept, .. } = cache;
    kept.clear();

    for &ijk in indices.iter() {
        let mut rel = [0.0; 3];
        for axis in 0..3 {
            let n = ijk[axis];
            let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
            rel[axis] = n as f64 * dims[axis] + sign * src[axis] - rcv[axis];
        }
        let image = Position3D::from(rel);
        let distance = image.magnitude();
        if max_distance.is_some_and(|max| distance >= max) {
            continue;
        }
        kept.push((ijk, image, distance));
    }

    out.resize(1, kept.len());
    for (n, (ijk, image, distance)) in kept.iter().enumerate() {
        out.time[n] = distance / c;
        out.value[0][n] = distance_gain(*distance);
        out.order[n] = *ijk;
        out.coords[n] = *image;
    }
    out.sort_by_time();

    log::trace!("image sources: {} of {} candidates kept", kept.len(), indices.len());
    Ok(())
}
