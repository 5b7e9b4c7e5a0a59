//! Core workspace - per (receiver, source) pair state
//!
//! Holds the lattice cache and the three echogram stages for one pair,
//! plus the dirty bits that gate recomputation and the taps the real-time
//! renderer reads. The band-split source history lives with the source.
//!
//! Each workspace carries an epoch, unique within its scene, and a
//! generation bumped on every change. Results computed elsewhere are only
//! accepted when both still match.

use crate::absorption::apply_absorption_bands;
use crate::directivity::DirectivityEncoder;
use crate::echogram::Echogram;
use crate::error::RoomResult;
use crate::image_source::{EchogramBound, LatticeCache, PairGeometry, compute_image_sources};
use crate::position::Position3D;
use crate::realtime::{RealtimeTaps, SourceRenderState};
use crate::rir::{Rir, RirRenderer};

/// Echograms of one pair at every processing stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EchogramSet {
    /// Omnidirectional, as enumerated
    pub raw: Echogram,
    /// Receiver channels, time sorted
    pub encoded: Echogram,
    /// One per octave band
    pub absorbed: Vec<Echogram>,
}

/// Scene-wide inputs to the echogram pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub bound: EchogramBound,
    pub absorption: Vec<[f32; 6]>,
    pub sample_rate: f64,
    /// Delays must stay below this many samples
    pub delay_capacity: usize,
}

/// Geometry, directivity and absorption for one pair.
///
/// Returns the real-time taps derived from the absorbed echograms.
pub fn run_pipeline(
    geometry: &PairGeometry,
    settings: &PipelineSettings,
    lattice: &mut LatticeCache,
    encoder: &mut DirectivityEncoder,
    set: &mut EchogramSet,
) -> RoomResult<RealtimeTaps> {
    compute_image_sources(geometry, settings.bound, lattice, &mut set.raw)?;
    encoder.encode(&set.raw, &mut set.encoded);
    apply_absorption_bands(&set.encoded, &settings.absorption, &mut set.absorbed);
    RealtimeTaps::from_echograms(
        &set.absorbed,
        settings.sample_rate,
        settings.delay_capacity,
    )
}

pub struct CoreWorkspace {
    geometry: PairGeometry,
    lattice: LatticeCache,
    encoder: DirectivityEncoder,
    echograms: EchogramSet,
    taps: RealtimeTaps,
    rir: Rir,
    /// One slot per image of `taps`
    scratch: Vec<f32>,
    needs_echogram_refresh: bool,
    needs_rir_refresh: bool,
    epoch: u64,
    generation: u64,
}

impl CoreWorkspace {
    pub fn new(geometry: PairGeometry, encoder: DirectivityEncoder, epoch: u64) -> Self {
        Self {
            geometry,
            lattice: LatticeCache::new(),
            encoder,
            echograms: EchogramSet::default(),
            taps: RealtimeTaps::default(),
            rir: Rir::default(),
            scratch: Vec::new(),
            needs_echogram_refresh: true,
            needs_rir_refresh: true,
            epoch,
            generation: 0,
        }
    }

    #[inline]
    pub fn geometry(&self) -> &PairGeometry {
        &self.geometry
    }

    #[inline]
    pub fn needs_echogram_refresh(&self) -> bool {
        self.needs_echogram_refresh
    }

    #[inline]
    pub fn needs_rir_refresh(&self) -> bool {
        self.needs_rir_refresh
    }

    /// Fixed at creation; never shared with an earlier pair in the same slot
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Bumped every time the pair is dirtied
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn echograms(&self) -> &EchogramSet {
        &self.echograms
    }

    pub fn taps(&self) -> &RealtimeTaps {
        &self.taps
    }

    pub fn rir(&self) -> &Rir {
        &self.rir
    }

    pub fn mark_dirty(&mut self) {
        self.needs_echogram_refresh = true;
        self.needs_rir_refresh = true;
        self.generation += 1;
    }

    /// Returns true if the position changed
    pub fn set_source(&mut self, position: Position3D) -> bool {
        if self.geometry.source == position {
            return false;
        }
        self.geometry.source = position;
        self.mark_dirty();
        true
    }

    /// Returns true if the position changed
    pub fn set_receiver(&mut self, position: Position3D) -> bool {
        if self.geometry.receiver == position {
            return false;
        }
        self.geometry.receiver = position;
        self.mark_dirty();
        true
    }

    pub fn set_dimensions(&mut self, dimensions: [f64; 3]) {
        self.geometry.dimensions = dimensions;
        self.mark_dirty();
    }

    /// Recompute every echogram stage if dirty
    pub fn refresh(&mut self, settings: &PipelineSettings) -> RoomResult<()> {
        if !self.needs_echogram_refresh {
            return Ok(());
        }
        let taps = run_pipeline(
            &self.geometry,
            settings,
            &mut self.lattice,
            &mut self.encoder,
            &mut self.echograms,
        )?;
        self.install_taps(taps);
        self.needs_echogram_refresh = false;
        Ok(())
    }

    /// Install results computed elsewhere for `epoch` and `generation`.
    ///
    /// Returns false (and keeps the pair dirty) if the pair was replaced or
    /// changed since.
    pub fn install(
        &mut self,
        epoch: u64,
        generation: u64,
        echograms: EchogramSet,
        taps: RealtimeTaps,
    ) -> bool {
        if epoch != self.epoch || generation != self.generation {
            return false;
        }
        self.echograms = echograms;
        self.install_taps(taps);
        self.needs_echogram_refresh = false;
        true
    }

    fn install_taps(&mut self, taps: RealtimeTaps) {
        if self.scratch.len() < taps.num_images() {
            self.scratch.resize(taps.num_images(), 0.0);
        }
        self.taps = taps;
    }

    /// Render the RIR if the echograms changed since the last render
    pub fn render_rir(&mut self, renderer: &mut RirRenderer) -> RoomResult<bool> {
        if !self.needs_rir_refresh || self.needs_echogram_refresh {
            return Ok(false);
        }
        renderer.render(&self.echograms.absorbed, &mut self.rir)?;
        self.needs_rir_refresh = false;
        Ok(true)
    }

    /// Mix the source's current block into `output` through this pair's taps
    pub fn render(&mut self, source: &SourceRenderState, output: &mut [Vec<f32>]) {
        source.render(&self.taps, &mut self.scratch, output);
    }
}
