//! Off-thread echogram computation
//!
//! The scene hands out [`EchogramJob`] snapshots of its dirty pairs. A
//! worker thread runs them and pushes the results through an SPSC ring;
//! the audio thread drains the ring with
//! [`ShoeboxScene::install_echograms`](crate::ShoeboxScene::install_echograms).
//! Every job carries the pair's epoch and generation, so results computed
//! for positions that have since changed, or for a pair that was removed
//! and re-created under the same IDs, are discarded on install.

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::directivity::ReceiverDirectivity;
use crate::error::RoomResult;
use crate::harmonics::Normalization;
use crate::image_source::{LatticeCache, PairGeometry};
use crate::realtime::RealtimeTaps;
use crate::workspace::{EchogramSet, PipelineSettings, run_pipeline};
use crate::{ReceiverId, SourceId};

/// Everything needed to compute one pair's echograms away from the scene
#[derive(Debug, Clone)]
pub struct EchogramJob {
    pub receiver: ReceiverId,
    pub source: SourceId,
    pub epoch: u64,
    pub generation: u64,
    pub geometry: PairGeometry,
    pub directivity: ReceiverDirectivity,
    pub normalization: Normalization,
    pub settings: PipelineSettings,
}

impl EchogramJob {
    /// Run the full pipeline for this pair
    pub fn run(self) -> RoomResult<EchogramUpdate> {
        let mut encoder = self.directivity.encoder(self.normalization)?;
        let mut echograms = EchogramSet::default();
        let taps = run_pipeline(
            &self.geometry,
            &self.settings,
            &mut LatticeCache::new(),
            &mut encoder,
            &mut echograms,
        )?;

        Ok(EchogramUpdate {
            receiver: self.receiver,
            source: self.source,
            epoch: self.epoch,
            generation: self.generation,
            echograms,
            taps,
        })
    }
}

/// Computed echograms for one pair, tagged with the state they match
#[derive(Debug)]
pub struct EchogramUpdate {
    pub receiver: ReceiverId,
    pub source: SourceId,
    pub epoch: u64,
    pub generation: u64,
    pub echograms: EchogramSet,
    pub taps: RealtimeTaps,
}

/// Worker side of the handoff
pub struct EchogramSender {
    producer: Producer<EchogramUpdate>,
}

impl EchogramSender {
    /// Queue an update without blocking; a full ring hands it back
    #[allow(clippy::result_large_err)]
    pub fn push(&mut self, update: EchogramUpdate) -> Result<(), EchogramUpdate> {
        self.producer.push(update).map_err(|PushError::Full(update)| update)
    }

    /// Free slots in the ring
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Audio-thread side of the handoff
pub struct EchogramReceiver {
    consumer: Consumer<EchogramUpdate>,
}

impl EchogramReceiver {
    /// Next pending update, if any
    pub fn pop(&mut self) -> Option<EchogramUpdate> {
        self.consumer.pop().ok()
    }

    /// Number of queued updates
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}

/// Create a handoff ring holding up to `capacity` updates
pub fn echogram_channel(capacity: usize) -> (EchogramSender, EchogramReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (EchogramSender { producer }, EchogramReceiver { consumer })
}
