//! 3D positions and the simulation coordinate frame
//!
//! User-facing positions are room coordinates: metres from the room corner,
//! `x` along the length, `y` along the width, `z` up. The simulator works in
//! a frame centred on the room with the `y` axis flipped, which makes `x`
//! the front, `y` the left and `z` the up direction of a receiver.

use serde::{Deserialize, Serialize};

/// 3D position in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position3D {
    /// Create new position
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Origin position
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Get magnitude (distance from origin)
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// True when the point lies inside (or on the walls of) a room of `dims`
    pub fn is_inside(&self, dims: &[f64; 3]) -> bool {
        self.to_array()
            .iter()
            .zip(dims.iter())
            .all(|(p, d)| (0.0..=*d).contains(p))
    }

    /// Room coordinates to the centred, y-flipped simulation frame
    pub fn to_simulation_frame(&self, dims: &[f64; 3]) -> Self {
        Self::new(
            self.x - dims[0] / 2.0,
            dims[1] / 2.0 - self.y,
            self.z - dims[2] / 2.0,
        )
    }

    /// Direction of this vector in the simulation frame
    pub fn to_spherical(&self) -> SphericalCoord {
        let distance = self.magnitude();
        if distance < 1e-10 {
            return SphericalCoord::new(0.0, 0.0, 0.0);
        }

        SphericalCoord {
            azimuth: self.y.atan2(self.x).to_degrees(),
            elevation: (self.z / distance).clamp(-1.0, 1.0).asin().to_degrees(),
            distance,
        }
    }
}

impl Default for Position3D {
    fn default() -> Self {
        Self::origin()
    }
}

impl From<[f64; 3]> for Position3D {
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

/// Spherical coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalCoord {
    /// Azimuth in degrees, counter-clockwise from the front (-180 to 180)
    pub azimuth: f64,
    /// Elevation in degrees (-90 to 90)
    pub elevation: f64,
    /// Distance from origin
    pub distance: f64,
}

impl SphericalCoord {
    pub fn new(azimuth: f64, elevation: f64, distance: f64) -> Self {
        Self {
            azimuth,
            elevation,
            distance,
        }
    }

    /// Inclination (polar angle from +z) in degrees
    pub fn inclination(&self) -> f64 {
        90.0 - self.elevation
    }
}
