//! Per-codec slot policy.
//!
//! Codecs differ in exactly two places: how the MB-code/MV-data family
//! picks its slot, and how large the temporal MV buffer is. Everything
//! else in the tracked-buffer algorithm is shared. The policy object is
//! chosen once at session construction.

use crate::tracked::NON_REF_SLOTS;
use enchal_core::{geom, SequenceParams};

/// Codec-specific slot and sizing decisions.
pub trait CodecPolicy: Send {
    /// Slot index for the MB-code/MV-data buffers of the current frame.
    /// `tracked_slot` is the slot the main algorithm just picked.
    fn mb_code_slot(&mut self, tracked_slot: usize) -> usize;

    /// Whether the MB-code family occupies the same slot namespace as
    /// the main tracked family (and is therefore released together with
    /// a tracked slot).
    fn mb_code_follows_main(&self) -> bool;

    /// Size of the per-reference MV data buffer, or `None` when the
    /// codec folds motion data into the MB-code buffer.
    fn mv_data_size(&self, seq: &SequenceParams) -> Option<u64>;

    /// Size of the temporal MV buffer.
    fn mv_temporal_size(&self, seq: &SequenceParams) -> u64;

    /// Whether the reconstruction pyramid (4x/8x) must be kept per slot.
    fn needs_recon_pyramid(&self, seq: &SequenceParams) -> bool;
}

/// Default policy: MB-code and MV-data are tracked with the main slot,
/// so a specific reference's motion data can be re-read later.
#[derive(Debug, Default)]
pub struct AvcPolicy;

impl CodecPolicy for AvcPolicy {
    fn mb_code_slot(&mut self, tracked_slot: usize) -> usize {
        tracked_slot
    }

    fn mb_code_follows_main(&self) -> bool {
        true
    }

    fn mv_data_size(&self, seq: &SequenceParams) -> Option<u64> {
        Some(seq.mv_data_size())
    }

    fn mv_temporal_size(&self, seq: &SequenceParams) -> u64 {
        // one cacheline per macroblock, rounded to an even MB count
        geom::align_up(seq.num_mbs(), 2) as u64 * geom::CACHELINE as u64
    }

    fn needs_recon_pyramid(&self, _seq: &SequenceParams) -> bool {
        false
    }
}

/// HEVC never re-reads a specific old reference's motion data, so its
/// MB-code family rotates through a ring as deep as the in-flight
/// window instead of tracking references. The ring depth itself is what
/// makes reuse safe: a slot comes around again only after enough frames
/// that the hardware can no longer be reading it.
#[derive(Debug)]
pub struct HevcPolicy {
    curr: usize,
    penu: usize,
    ante: usize,
    started: bool,
}

impl HevcPolicy {
    pub fn new() -> Self {
        Self {
            curr: 0,
            penu: 0,
            ante: 0,
            started: false,
        }
    }

    /// Ring history, most recent last.
    pub fn history(&self) -> (usize, usize, usize) {
        (self.ante, self.penu, self.curr)
    }
}

impl Default for HevcPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecPolicy for HevcPolicy {
    fn mb_code_slot(&mut self, _tracked_slot: usize) -> usize {
        self.ante = self.penu;
        self.penu = self.curr;
        self.curr = if self.started {
            (self.curr + 1) % NON_REF_SLOTS
        } else {
            self.started = true;
            0
        };
        self.curr
    }

    fn mb_code_follows_main(&self) -> bool {
        false
    }

    fn mv_data_size(&self, _seq: &SequenceParams) -> Option<u64> {
        None
    }

    fn mv_temporal_size(&self, seq: &SequenceParams) -> u64 {
        // collocated MV storage, sized from the codec sequence state:
        // whichever of the two block granularities needs more room, with
        // the unit count rounded to an even number of cachelines
        let w = seq.frame_width as u64;
        let h = seq.frame_height as u64;
        let mvt = align2(((w + 63) >> 6) * ((h + 15) >> 4));
        let mvtb = align2(((w + 31) >> 5) * ((h + 31) >> 5));
        mvt.max(mvtb) * geom::CACHELINE as u64
    }

    fn needs_recon_pyramid(&self, seq: &SequenceParams) -> bool {
        seq.vdenc_enabled
    }
}

fn align2(v: u64) -> u64 {
    (v + 1) & !1
}
