//! Real spherical harmonics (ACN channel ordering)
//!
//! Associated Legendre functions are evaluated by the standard three-term
//! recursion without the Condon-Shortley phase, as is usual for Ambisonics.

use serde::{Deserialize, Serialize};

use crate::error::{RoomError, RoomResult};
use crate::MAX_SH_ORDER;

/// Spherical harmonic normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Normalization {
    /// Full 3D normalization (orthonormal up to 4π)
    #[default]
    N3D,
    /// Schmidt semi-normalized
    SN3D,
}

/// Channel count for an order
#[inline]
pub const fn channel_count(order: usize) -> usize {
    (order + 1) * (order + 1)
}

/// ACN channel index from (order, degree)
#[inline]
pub fn acn_index(order: i32, degree: i32) -> usize {
    (order * order + order + degree) as usize
}

/// Get (order, degree) from ACN index
pub fn acn_to_order_degree(acn: usize) -> (i32, i32) {
    let order = (acn as f64).sqrt().floor() as i32;
    let degree = acn as i32 - order * order - order;
    (order, degree)
}

/// Evaluator for real spherical harmonics of a fixed order.
///
/// Normalization constants are computed once; `compute_for_direction`
/// does not allocate.
#[derive(Debug, Clone)]
pub struct SphericalHarmonics {
    order: usize,
    /// Normalization factor per ACN channel
    norms: Vec<f64>,
    /// Legendre table, `legendre[l * (order + 1) + m]`
    legendre: Vec<f64>,
    /// Coefficients per ACN channel
    coeffs: Vec<f32>,
}

impl SphericalHarmonics {
    pub fn new(order: usize, normalization: Normalization) -> RoomResult<Self> {
        if order > MAX_SH_ORDER {
            return Err(RoomError::InvalidShOrder(order));
        }

        let norms = (0..channel_count(order))
            .map(|acn| {
                let (l, m) = acn_to_order_degree(acn);
                let (l, m) = (l as usize, m.unsigned_abs() as usize);
                let delta = if m == 0 { 1.0 } else { 2.0 };
                // (l - m)! / (l + m)!
                let ratio: f64 = ((l - m + 1)..=(l + m)).map(|k| 1.0 / k as f64).product();
                let sn3d = (delta * ratio).sqrt();
                match normalization {
                    Normalization::SN3D => sn3d,
                    Normalization::N3D => sn3d * ((2 * l + 1) as f64).sqrt(),
                }
            })
            .collect();

        Ok(Self {
            order,
            norms,
            legendre: vec![0.0; (order + 1) * (order + 1)],
            coeffs: vec![0.0; channel_count(order)],
        })
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.coeffs.len()
    }

    /// Evaluate every harmonic for a direction given in degrees
    pub fn compute_for_direction(&mut self, azimuth: f64, elevation: f64) -> &[f32] {
        let az = azimuth.to_radians();
        let el = elevation.to_radians();
        let x = el.sin();
        let somx2 = el.cos().max(0.0);
        let stride = self.order + 1;
        let p = &mut self.legendre;

        p[0] = 1.0;
        for m in 1..=self.order {
            p[m * stride + m] = p[(m - 1) * stride + (m - 1)] * (2 * m - 1) as f64 * somx2;
        }
        for m in 0..self.order {
            p[(m + 1) * stride + m] = x * (2 * m + 1) as f64 * p[m * stride + m];
        }
        for m in 0..=self.order {
            for l in (m + 2)..=self.order {
                p[l * stride + m] = ((2 * l - 1) as f64 * x * p[(l - 1) * stride + m]
                    - (l + m - 1) as f64 * p[(l - 2) * stride + m])
                    / (l - m) as f64;
            }
        }

        for (acn, coeff) in self.coeffs.iter_mut().enumerate() {
            let (l, m) = acn_to_order_degree(acn);
            let ma = m.unsigned_abs() as usize;
            let azimuthal = match m.signum() {
                1 => (ma as f64 * az).cos(),
                -1 => (ma as f64 * az).sin(),
                _ => 1.0,
            };
            *coeff = (self.norms[acn] * p[l as usize * stride + ma] * azimuthal) as f32;
        }

        &self.coeffs
    }
}
