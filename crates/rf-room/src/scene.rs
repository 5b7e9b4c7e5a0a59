//! Shoebox scene manager
//!
//! Owns the room, the source and receiver registries, one
//! [`CoreWorkspace`] per (receiver, source) pair and one real-time history
//! per source. Mutations only mark the affected pairs dirty; the echogram
//! pipeline runs when [`ShoeboxScene::compute_echograms`] is called, and
//! only for dirty pairs.

use rayon::prelude::*;
use rf_dsp::OctaveBands;
use rf_dsp::fir::FirFilterbank;

use crate::config::{RoomConfig, validate_absorption, validate_dimensions};
use crate::directivity::ReceiverDirectivity;
use crate::error::{RoomError, RoomResult};
use crate::handoff::{EchogramJob, EchogramReceiver};
use crate::image_source::{EchogramBound, PairGeometry};
use crate::position::Position3D;
use crate::realtime::{SourceRenderState, delay_capacity};
use crate::registry::Registry;
use crate::rir::{Rir, RirRenderer};
use crate::workspace::{CoreWorkspace, EchogramSet, PipelineSettings};
use crate::{ReceiverId, SourceId};

#[derive(Debug, Clone)]
struct SourceEntry {
    position: Position3D,
}

#[derive(Debug, Clone)]
struct ReceiverEntry {
    position: Position3D,
    directivity: ReceiverDirectivity,
}

/// Rectangular room with sources, receivers and their pair workspaces
pub struct ShoeboxScene {
    config: RoomConfig,
    bands: OctaveBands,
    sources: Registry<SourceEntry>,
    receivers: Registry<ReceiverEntry>,
    /// `workspaces[receiver * max_sources + source]`
    workspaces: Vec<Option<Box<CoreWorkspace>>>,
    /// Band-split history per source slot, created on first render
    source_states: Vec<Option<Box<SourceRenderState>>>,
    /// Epoch handed to the next workspace
    next_epoch: u64,
    bound: Option<EchogramBound>,
    rir_renderer: Option<RirRenderer>,
}

impl ShoeboxScene {
    /// Create an empty scene
    pub fn new(config: RoomConfig) -> RoomResult<Self> {
        let bands = config.validate()?;
        let slots = config.max_receivers * config.max_sources;

        log::debug!(
            "shoebox scene {:?} m, {} bands from {} Hz, {} Hz",
            config.dimensions,
            bands.len(),
            config.lowest_band_hz,
            config.sample_rate
        );

        Ok(Self {
            sources: Registry::new("source", config.max_sources),
            receivers: Registry::new("receiver", config.max_receivers),
            workspaces: (0..slots).map(|_| None).collect(),
            source_states: (0..config.max_sources).map(|_| None).collect(),
            next_epoch: 0,
            bound: None,
            rir_renderer: None,
            bands,
            config,
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn bands(&self) -> &OctaveBands {
        &self.bands
    }

    /// Bound used by the last echogram computation
    pub fn bound(&self) -> Option<EchogramBound> {
        self.bound
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SOURCES & RECEIVERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Add a source; it gets the lowest free ID
    pub fn add_source(&mut self, position: Position3D) -> RoomResult<SourceId> {
        self.check_position(&position)?;
        let id = self.sources.insert(SourceEntry { position })?;

        let receivers: Vec<(u32, ReceiverEntry)> =
            self.receivers.iter().map(|(r, e)| (r, e.clone())).collect();
        for (r, entry) in receivers {
            self.create_workspace(r, id, entry.position, position, entry.directivity)?;
        }

        log::debug!("added source {id} at {position:?}");
        Ok(SourceId(id))
    }

    /// Add a spherical harmonic receiver of `order`
    pub fn add_sh_receiver(&mut self, order: usize, position: Position3D) -> RoomResult<ReceiverId> {
        let directivity = ReceiverDirectivity::spherical_harmonic(order)?;
        self.check_position(&position)?;
        let id = self.receivers.insert(ReceiverEntry {
            position,
            directivity,
        })?;

        let sources: Vec<(u32, Position3D)> =
            self.sources.iter().map(|(s, e)| (s, e.position)).collect();
        for (s, source_position) in sources {
            self.create_workspace(id, s, position, source_position, directivity)?;
        }

        log::debug!(
            "added receiver {id} ({} channels) at {position:?}",
            directivity.channel_count()
        );
        Ok(ReceiverId(id))
    }

    /// Move a source; pairs are dirtied only if the position changed
    pub fn update_source(&mut self, id: SourceId, position: Position3D) -> RoomResult<()> {
        self.check_position(&position)?;
        let entry = self.sources.try_get_mut(id.0)?;
        if entry.position == position {
            return Ok(());
        }
        entry.position = position;

        let max_sources = self.config.max_sources;
        for r in self.receivers.ids() {
            if let Some(ws) = self.workspaces[pair_index(max_sources, r, id.0)].as_deref_mut() {
                ws.set_source(position);
            }
        }
        Ok(())
    }

    /// Move a receiver; pairs are dirtied only if the position changed
    pub fn update_receiver(&mut self, id: ReceiverId, position: Position3D) -> RoomResult<()> {
        self.check_position(&position)?;
        let entry = self.receivers.try_get_mut(id.0)?;
        if entry.position == position {
            return Ok(());
        }
        entry.position = position;

        let max_sources = self.config.max_sources;
        for s in self.sources.ids() {
            if let Some(ws) = self.workspaces[pair_index(max_sources, id.0, s)].as_deref_mut() {
                ws.set_receiver(position);
            }
        }
        Ok(())
    }

    /// Remove a source and its pairs; the ID becomes reusable
    pub fn remove_source(&mut self, id: SourceId) -> RoomResult<()> {
        self.sources.remove(id.0)?;
        let max_sources = self.config.max_sources;
        for r in self.receivers.ids() {
            self.workspaces[pair_index(max_sources, r, id.0)] = None;
        }
        self.source_states[id.0 as usize] = None;
        log::debug!("removed source {}", id.0);
        Ok(())
    }

    /// Remove a receiver and its pairs; the ID becomes reusable
    pub fn remove_receiver(&mut self, id: ReceiverId) -> RoomResult<()> {
        self.receivers.remove(id.0)?;
        let max_sources = self.config.max_sources;
        for s in 0..max_sources as u32 {
            self.workspaces[pair_index(max_sources, id.0, s)] = None;
        }
        for state in self.source_states.iter_mut().flatten() {
            state.release_receiver(id.0 as usize);
        }
        log::debug!("removed receiver {}", id.0);
        Ok(())
    }

    /// Release every source, receiver and workspace; the room is kept
    pub fn clear(&mut self) {
        self.sources.clear();
        self.receivers.clear();
        for slot in &mut self.workspaces {
            *slot = None;
        }
        for slot in &mut self.source_states {
            *slot = None;
        }
        log::debug!("scene cleared");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ROOM
    // ═══════════════════════════════════════════════════════════════════════

    /// Resize the room. Every source and receiver must still fit inside.
    pub fn set_room_dimensions(&mut self, dimensions: [f64; 3]) -> RoomResult<()> {
        validate_dimensions(&dimensions)?;
        let outside = self
            .sources
            .iter()
            .map(|(_, e)| e.position)
            .chain(self.receivers.iter().map(|(_, e)| e.position))
            .find(|p| !p.is_inside(&dimensions));
        if let Some(p) = outside {
            return Err(RoomError::InvalidPosition(format!(
                "{p:?} outside room {dimensions:?}"
            )));
        }

        self.config.dimensions = dimensions;
        for ws in self.workspaces.iter_mut().flatten() {
            ws.set_dimensions(dimensions);
        }
        Ok(())
    }

    /// Replace the absorption table (band × wall)
    pub fn set_absorption(&mut self, absorption: Vec<[f32; 6]>) -> RoomResult<()> {
        validate_absorption(&absorption, self.config.num_bands)?;
        self.config.absorption = absorption;
        self.mark_all_dirty();
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ECHOGRAMS
    // ═══════════════════════════════════════════════════════════════════════

    /// Refresh the echograms of every dirty pair. Returns how many ran.
    pub fn compute_echograms(&mut self, bound: EchogramBound) -> RoomResult<usize> {
        self.set_bound(bound)?;
        let settings = self.pipeline_settings(bound);

        let dirty = self
            .workspaces
            .iter()
            .flatten()
            .filter(|ws| ws.needs_echogram_refresh())
            .count();
        if dirty == 0 {
            return Ok(0);
        }

        if self.config.parallel_echograms {
            self.workspaces
                .par_iter_mut()
                .flatten()
                .try_for_each(|ws| ws.refresh(&settings))?;
        } else {
            for ws in self.workspaces.iter_mut().flatten() {
                ws.refresh(&settings)?;
            }
        }

        log::debug!("refreshed {dirty} echogram pairs ({bound:?})");
        Ok(dirty)
    }

    /// Snapshot every dirty pair as a job for a worker thread
    pub fn echogram_jobs(&mut self, bound: EchogramBound) -> RoomResult<Vec<EchogramJob>> {
        self.set_bound(bound)?;
        let settings = self.pipeline_settings(bound);
        let normalization = self.config.sh_normalization;
        let max_sources = self.config.max_sources;

        let mut jobs = Vec::new();
        for (r, receiver) in self.receivers.iter() {
            for (s, _) in self.sources.iter() {
                let Some(ws) = self.workspaces[pair_index(max_sources, r, s)].as_deref() else {
                    continue;
                };
                if !ws.needs_echogram_refresh() {
                    continue;
                }
                jobs.push(EchogramJob {
                    receiver: ReceiverId(r),
                    source: SourceId(s),
                    epoch: ws.epoch(),
                    generation: ws.generation(),
                    geometry: *ws.geometry(),
                    directivity: receiver.directivity,
                    normalization,
                    settings: settings.clone(),
                });
            }
        }
        Ok(jobs)
    }

    /// Drain `updates`, installing the ones that are still current.
    ///
    /// Updates for removed pairs, pairs re-created under the same IDs and
    /// older generations are dropped.
    pub fn install_echograms(&mut self, updates: &mut EchogramReceiver) -> usize {
        let max_sources = self.config.max_sources;
        let mut installed = 0;
        while let Some(update) = updates.pop() {
            if !self.receivers.contains(update.receiver.0) || !self.sources.contains(update.source.0)
            {
                continue;
            }
            let slot = pair_index(max_sources, update.receiver.0, update.source.0);
            if let Some(ws) = self.workspaces[slot].as_deref_mut() {
                if ws.install(update.epoch, update.generation, update.echograms, update.taps) {
                    installed += 1;
                } else {
                    log::trace!(
                        "dropped stale echogram for {} / {}",
                        update.receiver,
                        update.source
                    );
                }
            }
        }
        installed
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RENDERING
    // ═══════════════════════════════════════════════════════════════════════

    /// Render RIRs for every pair whose echograms changed.
    ///
    /// Fractional delays are not implemented.
    pub fn render_rirs(&mut self, fractional_delays: bool) -> RoomResult<usize> {
        if fractional_delays {
            return Err(RoomError::NotSupported("fractional delay RIR rendering"));
        }

        let renderer = match self.rir_renderer.take() {
            Some(renderer) => renderer,
            None => {
                let fir = FirFilterbank::design(
                    &self.bands,
                    self.config.fir_order,
                    self.config.fir_window,
                    self.config.sample_rate,
                )?;
                RirRenderer::new(fir, self.config.sample_rate)
            }
        };
        let renderer = self.rir_renderer.insert(renderer);

        let mut rendered = 0;
        for ws in self.workspaces.iter_mut().flatten() {
            if ws.render_rir(renderer)? {
                rendered += 1;
            }
        }
        log::debug!("rendered {rendered} RIRs");
        Ok(rendered)
    }

    /// Render one block of early reflections for `receiver`.
    ///
    /// `inputs` pairs each source with its block; sources without an entry
    /// play silence. `output` must have one buffer per receiver channel.
    /// If `n_samples` differs from the configured block size the output is
    /// zeroed and nothing is rendered.
    ///
    /// A source advances by one block when this receiver has already heard
    /// its current block. Otherwise the receiver renders the block another
    /// receiver already pushed, and this call's input for that source is
    /// ignored, so every receiver of one audio callback shares one band
    /// split per source.
    pub fn apply_echogram_td(
        &mut self,
        receiver: ReceiverId,
        inputs: &[(SourceId, &[f32])],
        output: &mut [Vec<f32>],
        n_samples: usize,
    ) -> RoomResult<()> {
        let channels = self.receivers.try_get(receiver.0)?.directivity.channel_count();
        if output.len() != channels {
            return Err(RoomError::InvalidChannelCount {
                expected: channels,
                got: output.len(),
            });
        }

        let block_size = self.config.block_size;
        if n_samples != block_size {
            log::trace!("block of {n_samples} samples, expected {block_size}: output zeroed");
            for channel in output.iter_mut() {
                channel.fill(0.0);
            }
            return Ok(());
        }

        if let Some(short) = output.iter().find(|c| c.len() < n_samples) {
            return Err(RoomError::BufferSizeMismatch {
                expected: n_samples,
                got: short.len(),
            });
        }
        for (source, block) in inputs {
            self.sources.try_get(source.0)?;
            if block.len() < n_samples {
                return Err(RoomError::BufferSizeMismatch {
                    expected: n_samples,
                    got: block.len(),
                });
            }
        }

        for channel in output.iter_mut() {
            channel[..n_samples].fill(0.0);
        }

        let max_sources = self.config.max_sources;
        let max_receivers = self.config.max_receivers;
        let sample_rate = self.config.sample_rate;
        let buffer_len = self.config.circular_buffer_len;
        let slot = receiver.0 as usize;

        for (s, _) in self.sources.iter() {
            let Some(ws) = self.workspaces[pair_index(max_sources, receiver.0, s)].as_deref_mut()
            else {
                continue;
            };

            let entry = &mut self.source_states[s as usize];
            if entry.is_none() {
                *entry = Some(Box::new(SourceRenderState::new(
                    &self.bands,
                    sample_rate,
                    block_size,
                    buffer_len,
                    max_receivers,
                )?));
            }
            let Some(state) = entry.as_deref_mut() else {
                continue;
            };

            if !state.is_pending_for(slot) {
                let input = inputs
                    .iter()
                    .find(|(id, _)| id.0 == s)
                    .map(|(_, block)| &block[..n_samples]);
                state.advance(input, n_samples);
            }
            ws.render(state, output);
            state.mark_consumed(slot);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn num_receivers(&self) -> usize {
        self.receivers.len()
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.ids().into_iter().map(SourceId).collect()
    }

    pub fn receiver_ids(&self) -> Vec<ReceiverId> {
        self.receivers.ids().into_iter().map(ReceiverId).collect()
    }

    pub fn source_position(&self, id: SourceId) -> RoomResult<Position3D> {
        Ok(self.sources.try_get(id.0)?.position)
    }

    pub fn receiver_position(&self, id: ReceiverId) -> RoomResult<Position3D> {
        Ok(self.receivers.try_get(id.0)?.position)
    }

    pub fn receiver_directivity(&self, id: ReceiverId) -> RoomResult<ReceiverDirectivity> {
        Ok(self.receivers.try_get(id.0)?.directivity)
    }

    /// Output channels of a receiver
    pub fn receiver_channels(&self, id: ReceiverId) -> RoomResult<usize> {
        Ok(self.receiver_directivity(id)?.channel_count())
    }

    /// Echograms of one pair at every stage
    pub fn echograms(&self, receiver: ReceiverId, source: SourceId) -> RoomResult<&EchogramSet> {
        Ok(self.workspace(receiver, source)?.echograms())
    }

    /// Last rendered RIR of one pair
    pub fn rir(&self, receiver: ReceiverId, source: SourceId) -> RoomResult<&Rir> {
        Ok(self.workspace(receiver, source)?.rir())
    }

    /// True if the pair's echograms are out of date
    pub fn is_dirty(&self, receiver: ReceiverId, source: SourceId) -> RoomResult<bool> {
        Ok(self.workspace(receiver, source)?.needs_echogram_refresh())
    }

    /// True if the pair's RIR is out of date
    pub fn needs_rir_refresh(&self, receiver: ReceiverId, source: SourceId) -> RoomResult<bool> {
        Ok(self.workspace(receiver, source)?.needs_rir_refresh())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════

    fn workspace(&self, receiver: ReceiverId, source: SourceId) -> RoomResult<&CoreWorkspace> {
        self.receivers.try_get(receiver.0)?;
        self.sources.try_get(source.0)?;
        self.workspaces[pair_index(self.config.max_sources, receiver.0, source.0)]
            .as_deref()
            .ok_or(RoomError::InvalidHandle {
                kind: "source",
                id: source.0,
            })
    }

    fn create_workspace(
        &mut self,
        receiver: u32,
        source: u32,
        receiver_position: Position3D,
        source_position: Position3D,
        directivity: ReceiverDirectivity,
    ) -> RoomResult<()> {
        let geometry = PairGeometry {
            dimensions: self.config.dimensions,
            source: source_position,
            receiver: receiver_position,
            speed_of_sound: self.config.speed_of_sound,
        };
        let encoder = directivity.encoder(self.config.sh_normalization)?;
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        self.workspaces[pair_index(self.config.max_sources, receiver, source)] =
            Some(Box::new(CoreWorkspace::new(geometry, encoder, epoch)));
        Ok(())
    }

    fn check_position(&self, position: &Position3D) -> RoomResult<()> {
        if !position.is_finite() || !position.is_inside(&self.config.dimensions) {
            return Err(RoomError::InvalidPosition(format!(
                "{position:?} outside room {:?}",
                self.config.dimensions
            )));
        }
        Ok(())
    }

    fn set_bound(&mut self, bound: EchogramBound) -> RoomResult<()> {
        bound.validate()?;
        if self.bound != Some(bound) {
            if self.bound.is_some() {
                self.mark_all_dirty();
            }
            self.bound = Some(bound);
        }
        Ok(())
    }

    fn mark_all_dirty(&mut self) {
        for ws in self.workspaces.iter_mut().flatten() {
            ws.mark_dirty();
        }
    }

    fn pipeline_settings(&self, bound: EchogramBound) -> PipelineSettings {
        PipelineSettings {
            bound,
            absorption: self.config.absorption.clone(),
            sample_rate: self.config.sample_rate,
            delay_capacity: delay_capacity(self.config.circular_buffer_len, self.config.block_size),
        }
    }
}

impl Drop for ShoeboxScene {
    fn drop(&mut self) {
        log::debug!(
            "dropping scene: {} sources, {} receivers",
            self.sources.len(),
            self.receivers.len()
        );
    }
}

#[inline]
fn pair_index(max_sources: usize, receiver: u32, source: u32) -> usize {
    receiver as usize * max_sources + source as usize
}
