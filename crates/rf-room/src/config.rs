//! Room configuration
//!
//! A [`RoomConfig`] fully describes a scene's room and engine settings. It
//! round-trips through JSON and is checked once by [`RoomConfig::validate`]
//! before any scene is built from it.

use std::path::Path;

use rf_dsp::OctaveBands;
use rf_dsp::fir::{DEFAULT_FIR_ORDER, Window};
use serde::{Deserialize, Serialize};

use crate::error::{RoomError, RoomResult};
use crate::harmonics::Normalization;
use crate::{DEFAULT_CIRCULAR_BUFFER_LEN, MAX_RECEIVERS, MAX_SOURCES};

/// The six axis-aligned walls, in absorption table column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wall {
    /// x = 0
    Left,
    /// x = length
    Right,
    /// y = 0
    Back,
    /// y = width
    Front,
    /// z = 0
    Floor,
    /// z = height
    Ceiling,
}

impl Wall {
    pub const ALL: [Wall; 6] = [
        Wall::Left,
        Wall::Right,
        Wall::Back,
        Wall::Front,
        Wall::Floor,
        Wall::Ceiling,
    ];

    /// Column in the absorption table
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Acoustic material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Material {
    /// Concrete (very reflective)
    Concrete,
    Brick,
    /// Drywall/plasterboard
    Drywall,
    Glass,
    WoodPanel,
    /// Carpet (absorptive)
    Carpet,
    /// Heavy curtain (very absorptive)
    HeavyCurtain,
    AcousticTile,
    AcousticFoam,
    /// Perfect reflector
    Rigid,
}

impl Material {
    /// Octave band centres the material table is measured at
    pub const BAND_CENTRES_HZ: [f64; 6] = [125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0];

    /// Get absorption coefficients at octave band frequencies
    /// Returns: [125, 250, 500, 1000, 2000, 4000] Hz
    pub fn absorption_coefficients(&self) -> [f32; 6] {
        match self {
            Material::Concrete => [0.01, 0.01, 0.02, 0.02, 0.02, 0.03],
            Material::Brick => [0.03, 0.03, 0.03, 0.04, 0.05, 0.07],
            Material::Drywall => [0.29, 0.10, 0.05, 0.04, 0.07, 0.09],
            Material::Glass => [0.35, 0.25, 0.18, 0.12, 0.07, 0.04],
            Material::WoodPanel => [0.42, 0.21, 0.10, 0.08, 0.06, 0.06],
            Material::Carpet => [0.02, 0.06, 0.14, 0.37, 0.60, 0.65],
            Material::HeavyCurtain => [0.07, 0.31, 0.49, 0.75, 0.70, 0.60],
            Material::AcousticTile => [0.50, 0.70, 0.60, 0.70, 0.70, 0.50],
            Material::AcousticFoam => [0.35, 0.51, 0.82, 0.98, 0.99, 0.99],
            Material::Rigid => [0.0; 6],
        }
    }
}

/// Wall material configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallMaterials {
    pub left: Material,
    pub right: Material,
    pub back: Material,
    pub front: Material,
    pub floor: Material,
    pub ceiling: Material,
}

impl Default for WallMaterials {
    fn default() -> Self {
        Self {
            left: Material::Drywall,
            right: Material::Drywall,
            back: Material::Drywall,
            front: Material::Drywall,
            floor: Material::Carpet,
            ceiling: Material::AcousticTile,
        }
    }
}

impl WallMaterials {
    /// Same material on every wall
    pub fn uniform(material: Material) -> Self {
        Self {
            left: material,
            right: material,
            back: material,
            front: material,
            floor: material,
            ceiling: material,
        }
    }

    pub fn get(&self, wall: Wall) -> Material {
        match wall {
            Wall::Left => self.left,
            Wall::Right => self.right,
            Wall::Back => self.back,
            Wall::Front => self.front,
            Wall::Floor => self.floor,
            Wall::Ceiling => self.ceiling,
        }
    }

    /// Absorption table (band × wall) for the six material bands
    pub fn absorption_table(&self) -> Vec<[f32; 6]> {
        (0..Material::BAND_CENTRES_HZ.len())
            .map(|band| Wall::ALL.map(|wall| self.get(wall).absorption_coefficients()[band]))
            .collect()
    }
}

/// Complete scene configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Room length, width, height in metres
    pub dimensions: [f64; 3],
    /// Absorption coefficient per band, per wall (see [`Wall`])
    pub absorption: Vec<[f32; 6]>,
    /// Centre of the lowest octave band (Hz)
    pub lowest_band_hz: f64,
    pub num_bands: usize,
    /// Speed of sound (m/s)
    pub speed_of_sound: f64,
    pub sample_rate: f64,
    /// Samples per real-time block
    pub block_size: usize,
    pub max_sources: usize,
    pub max_receivers: usize,
    /// Real-time circular buffer length per band and source (power of two,
    /// longer than one block)
    pub circular_buffer_len: usize,
    /// FIR filterbank order for RIR rendering (even)
    pub fir_order: usize,
    pub fir_window: Window,
    pub sh_normalization: Normalization,
    /// Compute dirty echograms on the rayon pool
    pub parallel_echograms: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::from_materials([5.0, 4.0, 3.0], &WallMaterials::default())
    }
}

impl RoomConfig {
    /// Config with a six-band absorption table taken from wall materials
    pub fn from_materials(dimensions: [f64; 3], materials: &WallMaterials) -> Self {
        Self {
            dimensions,
            absorption: materials.absorption_table(),
            lowest_band_hz: Material::BAND_CENTRES_HZ[0],
            num_bands: Material::BAND_CENTRES_HZ.len(),
            speed_of_sound: 343.0,
            sample_rate: 48000.0,
            block_size: 512,
            max_sources: MAX_SOURCES,
            max_receivers: MAX_RECEIVERS,
            circular_buffer_len: DEFAULT_CIRCULAR_BUFFER_LEN,
            fir_order: DEFAULT_FIR_ORDER,
            fir_window: Window::default(),
            sh_normalization: Normalization::default(),
            parallel_echograms: false,
        }
    }

    /// Config with the same absorption on every band and wall
    pub fn with_uniform_absorption(dimensions: [f64; 3], absorption: f32) -> Self {
        let mut config = Self::from_materials(dimensions, &WallMaterials::uniform(Material::Rigid));
        config.absorption = vec![[absorption; 6]; config.num_bands];
        config
    }

    /// Parse from JSON
    pub fn from_json_str(json: &str) -> RoomResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> RoomResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> RoomResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field and build the octave band layout
    pub fn validate(&self) -> RoomResult<OctaveBands> {
        validate_dimensions(&self.dimensions)?;

        let bands = OctaveBands::new(self.lowest_band_hz, self.num_bands)?;
        bands.check_nyquist(self.sample_rate)?;
        validate_absorption(&self.absorption, self.num_bands)?;

        if !(self.speed_of_sound > 0.0) || !self.speed_of_sound.is_finite() {
            return Err(invalid(format!("speed of sound {}", self.speed_of_sound)));
        }
        if self.block_size == 0 {
            return Err(invalid("block size must be non-zero".into()));
        }
        if self.max_sources == 0 || self.max_receivers == 0 {
            return Err(invalid("source and receiver limits must be non-zero".into()));
        }
        if !self.circular_buffer_len.is_power_of_two() {
            return Err(invalid(format!(
                "circular buffer length {} is not a power of two",
                self.circular_buffer_len
            )));
        }
        if self.block_size >= self.circular_buffer_len {
            return Err(invalid(format!(
                "block size {} must be shorter than the circular buffer ({})",
                self.block_size, self.circular_buffer_len
            )));
        }
        if self.fir_order == 0 || self.fir_order % 2 != 0 {
            return Err(invalid(format!("FIR order {} must be even", self.fir_order)));
        }

        Ok(bands)
    }
}

pub(crate) fn validate_dimensions(dimensions: &[f64; 3]) -> RoomResult<()> {
    if dimensions.iter().any(|d| !(*d > 0.0) || !d.is_finite()) {
        return Err(invalid(format!("room dimensions {dimensions:?}")));
    }
    Ok(())
}

pub(crate) fn validate_absorption(absorption: &[[f32; 6]], num_bands: usize) -> RoomResult<()> {
    if absorption.len() != num_bands {
        return Err(invalid(format!(
            "absorption table has {} bands, expected {num_bands}",
            absorption.len()
        )));
    }
    if absorption.iter().flatten().any(|a| !(0.0..=1.0).contains(a)) {
        return Err(invalid("absorption coefficients must lie in [0, 1]".into()));
    }
    Ok(())
}

fn invalid(msg: String) -> RoomError {
    RoomError::InvalidConfig(msg)
}
