//! ReelForge Shoebox Room Engine
//!
//! Geometric early-reflection simulation for rectangular rooms:
//!
//! ## Image Sources
//! - Lattice enumeration bounded by propagation time or reflection order
//! - Distance attenuation and arrival-time ordering
//!
//! ## Receivers
//! - Spherical harmonic directivity up to 7th order (64 channels)
//! - ACN ordering, N3D or SN3D normalization
//!
//! ## Absorption
//! - Per octave band, per wall reflection coefficients
//!
//! ## Rendering
//! - Offline room impulse responses through an FIR octave filterbank
//! - Real-time per-band circular-buffer convolution
//!
//! ## Threading
//! - Single-threaded audio path, optional rayon geometry, SPSC echogram handoff

#![allow(missing_docs)]

pub mod absorption;
pub mod config;
pub mod directivity;
pub mod echogram;
pub mod handoff;
pub mod harmonics;
pub mod image_source;
pub mod realtime;
pub mod registry;
pub mod rir;
pub mod scene;
pub mod workspace;

mod error;
mod position;

pub use config::{Material, RoomConfig, Wall, WallMaterials};
pub use directivity::ReceiverDirectivity;
pub use echogram::Echogram;
pub use error::{RoomError, RoomResult};
pub use handoff::{EchogramJob, EchogramReceiver, EchogramSender, EchogramUpdate, echogram_channel};
pub use harmonics::Normalization;
pub use image_source::EchogramBound;
pub use position::{Position3D, SphericalCoord};
pub use rir::Rir;
pub use scene::ShoeboxScene;
pub use workspace::EchogramSet;

use serde::{Deserialize, Serialize};

/// Default source limit
pub const MAX_SOURCES: usize = 128;

/// Default receiver limit
pub const MAX_RECEIVERS: usize = 16;

/// Highest supported spherical harmonic order
pub const MAX_SH_ORDER: usize = 7;

/// Default real-time circular buffer length (samples, power of two)
pub const DEFAULT_CIRCULAR_BUFFER_LEN: usize = 1 << 17;

/// Source handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

/// Receiver handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReceiverId(pub u32);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source {}", self.0)
    }
}

impl std::fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "receiver {}", self.0)
    }
}
