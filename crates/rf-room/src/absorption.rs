//! Wall absorption per octave band
//!
//! A reflection of order `o` along one axis hits the two opposing walls of
//! that axis `|o|` times in total. In the simulation frame the positive
//! direction of each axis faces the right wall (x), the back wall (y, since
//! y is flipped) and the ceiling (z).

use crate::config::Wall;
use crate::echogram::Echogram;

/// (negative wall, positive wall) per simulation axis
const AXIS_WALLS: [(Wall, Wall); 3] = [
    (Wall::Left, Wall::Right),
    (Wall::Front, Wall::Back),
    (Wall::Floor, Wall::Ceiling),
];

/// Hits on the (negative, positive) wall for a signed reflection order
#[inline]
pub fn wall_hits(order: i32) -> (u32, u32) {
    let n = order.unsigned_abs();
    let half = n / 2;
    match (n % 2, order > 0) {
        (0, _) => (half, half),
        (_, true) => (half, half + 1),
        (_, false) => (half + 1, half),
    }
}

/// Reflection coefficients `sqrt(1 - a)` for one band
#[inline]
pub fn reflection_coefficients(absorption: &[f32; 6]) -> [f64; 6] {
    absorption.map(|a| (1.0 - a as f64).max(0.0).sqrt())
}

/// Total attenuation for an image with the given reflection orders
#[inline]
pub fn reflection_gain(order: &[i32; 3], coeffs: &[f64; 6]) -> f64 {
    order
        .iter()
        .zip(AXIS_WALLS.iter())
        .map(|(&o, &(neg, pos))| {
            let (n_neg, n_pos) = wall_hits(o);
            coeffs[neg.index()].powi(n_neg as i32) * coeffs[pos.index()].powi(n_pos as i32)
        })
        .product()
}

/// Copy `encoded` into `out` with one band's wall attenuation applied
pub fn apply_absorption(encoded: &Echogram, absorption: &[f32; 6], out: &mut Echogram) {
    out.clone_from(encoded);
    let coeffs = reflection_coefficients(absorption);
    for (n, order) in encoded.order.iter().enumerate() {
        let gain = reflection_gain(order, &coeffs);
        for channel in &mut out.value {
            channel[n] *= gain;
        }
    }
}

/// Apply every band of `table`, resizing `out` to one echogram per band
pub fn apply_absorption_bands(encoded: &Echogram, table: &[[f32; 6]], out: &mut Vec<Echogram>) {
    out.resize_with(table.len(), Echogram::default);
    for (band, absorption) in out.iter_mut().zip(table) {
        apply_absorption(encoded, absorption, band);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_hits() {
        assert_eq!(wall_hits(0), (0, 0));
        assert_eq!(wall_hits(1), (0, 1));
        assert_eq!(wall_hits(-1), (1, 0));
        assert_eq!(wall_hits(2), (1, 1));
        assert_eq!(wall_hits(-2), (1, 1));
        assert_eq!(wall_hits(3), (1, 2));
        assert_eq!(wall_hits(-3), (2, 1));
    }

    fn echogram_with_orders(orders: &[[i32; 3]], channels: usize) -> Echogram {
        let mut e = Echogram::new(channels, orders.len());
        for (n, o) in orders.iter().enumerate() {
            e.order[n] = *o;
            e.time[n] = n as f64 * 0.001;
            for ch in &mut e.value {
                ch[n] = 0.5;
            }
        }
        e
    }

    #[test]
    fn test_zero_absorption_is_identity() {
        let e = echogram_with_orders(&[[0, 0, 0], [1, -2, 3], [-4, 0, 1]], 4);
        let mut out = Echogram::default();
        apply_absorption(&e, &[0.0; 6], &mut out);
        assert_eq!(out, e);
    }

    #[test]
    fn test_single_wall_attenuation() {
        let e = echogram_with_orders(&[[1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, 0, -1]], 1);
        // Only the right wall absorbs
        let mut absorption = [0.0; 6];
        absorption[Wall::Right.index()] = 0.75;

        let mut out = Echogram::default();
        apply_absorption(&e, &absorption, &mut out);
        assert!((out.value[0][0] - 0.25).abs() < 1e-12); // 0.5 * sqrt(0.25)
        assert_eq!(out.value[0][1], 0.5);
        assert_eq!(out.value[0][2], 0.5);
        assert_eq!(out.value[0][3], 0.5);
    }

    #[test]
    fn test_y_axis_positive_is_back_wall() {
        let e = echogram_with_orders(&[[0, 1, 0], [0, -1, 0]], 1);
        let mut absorption = [0.0; 6];
        absorption[Wall::Back.index()] = 1.0;

        let mut out = Echogram::default();
        apply_absorption(&e, &absorption, &mut out);
        assert_eq!(out.value[0][0], 0.0);
        assert_eq!(out.value[0][1], 0.5);
    }

    #[test]
    fn test_band_table() {
        let e = echogram_with_orders(&[[2, 0, 0]], 1);
        let table = vec![[0.0; 6], [0.19; 6], [1.0; 6]];
        let mut out = Vec::new();
        apply_absorption_bands(&e, &table, &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].value[0][0], 0.5);
        // Two hits at sqrt(0.81) each
        assert!((out[1].value[0][0] - 0.5 * 0.81).abs() < 1e-6);
        assert_eq!(out[2].value[0][0], 0.0);
    }
}
