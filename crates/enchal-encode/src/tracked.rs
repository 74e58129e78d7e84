//! The tracked-buffer slot table and per-frame lifecycle algorithm.
//!
//! The slot table is a fixed arena: the first [`REF_SLOTS`] entries are
//! reference-eligible, the last [`NON_REF_SLOTS`] form the
//! non-reference ring. Families are addressed by (kind, slot index)
//! through the allocator; this module never owns device memory itself.
//!
//! Reclamation is lazy: a reference slot is freed only when a newer
//! frame's reference list proves its occupant unreachable. Across a
//! resolution change, the three most recently used slots are kept alive
//! and drained one per frame, because the hardware pipeline can still
//! be executing against them.

use crate::policy::{AvcPolicy, CodecPolicy, HevcPolicy};
use crate::sizing;
use enchal_alloc::{AllocRequest, Device, ResourceAllocator, ResourceHandle, ResourceKind};
use enchal_core::{CodecStandard, EnchalError, Result, ScaledDims, SequenceParams, SurfaceFormat, TileMode};
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Longest reference list the slot table can track.
pub const MAX_REF_FRAMES: usize = 16;
/// Reference-eligible slot range: one per possible reference plus the
/// current reconstruction.
pub const REF_SLOTS: usize = MAX_REF_FRAMES + 1;
/// Non-reference ring depth.
pub const NON_REF_SLOTS: usize = 3;
/// Total slot count.
pub const TRACKED_SLOTS: usize = REF_SLOTS + NON_REF_SLOTS;

/// Session-wide tuning. `inflight_depth` is the bound on frames the
/// asynchronous hardware can be executing at once; it sets both the
/// resolution-change drain length and the ring-rotation depth.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub inflight_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { inflight_depth: 3 }
    }
}

/// Per-frame input from the owning encoder pipeline.
#[derive(Debug, Clone)]
pub struct FrameParams {
    /// Reconstructed-picture index of the current frame.
    pub recon_index: u8,
    /// Reference-picture list for the current frame, in order.
    pub ref_list: SmallVec<[u8; MAX_REF_FRAMES]>,
    /// The current frame will appear in future reference lists.
    pub used_as_ref: bool,
}

/// Result of slot selection. `must_wait` is the caller's obligation to
/// fence the GPU before touching the slot's memory; it is returned here
/// rather than read out-of-band so the contract is visible in the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSelection {
    pub index: usize,
    pub must_wait: bool,
}

/// Result of a pre-analysis cache probe. On a hit the slot's downscaled
/// surface is already populated from an earlier submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreencSlot {
    pub index: usize,
    pub cache_hit: bool,
}

/// Slot addressing for the typed accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRef {
    /// The slot chosen by the most recent `allocate_for_curr_frame`.
    Current,
    Index(usize),
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    /// Reconstructed-picture index occupying this slot; `None` is Free.
    frame: Option<u8>,
    /// Claimed during the current multi-call batch (pre-analysis).
    used_this_frame: bool,
    /// A non-reference frame has used this slot before; reuse then
    /// requires synchronization.
    non_ref_used: bool,
}

/// Tracked-buffer manager. One instance per encode session; the
/// allocator (and its slot table) has exactly one writer, the
/// sequential per-frame call.
pub struct TrackedBuffer<D: Device> {
    pub(crate) alloc: ResourceAllocator<D>,
    pub(crate) seq: SequenceParams,
    policy: Box<dyn CodecPolicy>,
    pub(crate) config: SessionConfig,

    slots: [Slot; TRACKED_SLOTS],

    // main family three-deep history
    curr_idx: Option<usize>,
    penu_idx: Option<usize>,
    ante_idx: Option<usize>,
    non_ref_cursor: usize,

    // CSC family three-deep history and ring
    pub(crate) csc_curr_idx: Option<usize>,
    pub(crate) csc_penu_idx: Option<usize>,
    pub(crate) csc_ante_idx: Option<usize>,
    pub(crate) csc_ring_cursor: usize,
    pub(crate) csc_ring_used: [bool; NON_REF_SLOTS],
    pub(crate) wait_csc: bool,
    pub(crate) csc_pending_release: SmallVec<[usize; NON_REF_SLOTS]>,
    pub(crate) csc_drain_left: usize,

    // slots surviving a resolution change, oldest first
    pending_release: SmallVec<[usize; NON_REF_SLOTS]>,
    drain_left: usize,

    wait_main: bool,
    allocate_mb_code: bool,
    mb_code_curr_idx: Option<usize>,
    frames_seen: u64,
}

impl<D: Device> TrackedBuffer<D> {
    /// Build a manager for one encode session. The codec policy comes
    /// from the sequence's standard.
    pub fn new(
        alloc: ResourceAllocator<D>,
        seq: SequenceParams,
        config: SessionConfig,
    ) -> Result<Self> {
        if config.inflight_depth == 0 || config.inflight_depth > NON_REF_SLOTS {
            return Err(EnchalError::InvalidParameter(format!(
                "inflight depth {} outside 1..={}",
                config.inflight_depth, NON_REF_SLOTS
            )));
        }
        let policy: Box<dyn CodecPolicy> = match seq.codec {
            CodecStandard::Hevc => Box::new(HevcPolicy::new()),
            _ => Box::new(AvcPolicy),
        };
        Ok(Self {
            alloc,
            seq,
            policy,
            config,
            slots: [Slot::default(); TRACKED_SLOTS],
            curr_idx: None,
            penu_idx: None,
            ante_idx: None,
            non_ref_cursor: 0,
            csc_curr_idx: None,
            csc_penu_idx: None,
            csc_ante_idx: None,
            csc_ring_cursor: 0,
            csc_ring_used: [false; NON_REF_SLOTS],
            wait_csc: false,
            csc_pending_release: SmallVec::new(),
            csc_drain_left: 0,
            pending_release: SmallVec::new(),
            drain_left: 0,
            wait_main: false,
            allocate_mb_code: true,
            mb_code_curr_idx: None,
            frames_seen: 0,
        })
    }

    pub fn allocator(&self) -> &ResourceAllocator<D> {
        &self.alloc
    }

    pub fn sequence(&self) -> &SequenceParams {
        &self.seq
    }

    /// Replace the sequence-level sizing parameters. Call together with
    /// [`resize`](Self::resize) on a resolution change.
    pub fn set_sequence(&mut self, seq: SequenceParams) {
        self.seq = seq;
    }

    /// Caller flags whether this frame needs fresh MB-code/MV-data
    /// buffers, or reuses externally provided ones.
    pub fn set_allocation_flag(&mut self, allocate: bool) {
        self.allocate_mb_code = allocate;
    }

    pub fn is_mb_code_allocation_needed(&self) -> bool {
        self.allocate_mb_code
    }

    /// Select and populate a slot for the current frame.
    pub fn allocate_for_curr_frame(&mut self, frame: &FrameParams) -> Result<SlotSelection> {
        // drain one aged-out slot from the previous resolution
        if self.drain_left > 0 {
            self.deferred_deallocate_on_res_change();
            self.drain_left -= 1;
        }

        // select before touching the history, so a failed lookup leaves
        // the three-deep window intact
        let selection = self.look_up_buf_index(frame)?;
        self.ante_idx = self.penu_idx;
        self.penu_idx = self.curr_idx;
        self.curr_idx = Some(selection.index);
        self.wait_main = selection.must_wait;

        let slot = &mut self.slots[selection.index];
        slot.frame = Some(frame.recon_index);
        slot.used_this_frame = true;

        debug!(
            slot = selection.index,
            recon = frame.recon_index,
            used_as_ref = frame.used_as_ref,
            must_wait = selection.must_wait,
            "tracked slot assigned"
        );

        self.allocate_families(selection.index, frame)?;
        self.frames_seen += 1;
        Ok(selection)
    }

    /// Pick the slot for the current frame.
    fn look_up_buf_index(&mut self, frame: &FrameParams) -> Result<SlotSelection> {
        let trackable = frame.used_as_ref
            && frame.ref_list.len() <= MAX_REF_FRAMES
            && !self.seq.gop_is_idr_only;

        if trackable {
            // Lazy reclamation: a slot is freed only once the incoming
            // list proves its occupant is no longer reachable.
            for i in 0..REF_SLOTS {
                if self.pending_release.contains(&i) {
                    continue;
                }
                if let Some(f) = self.slots[i].frame {
                    if !frame.ref_list.contains(&f) {
                        debug!(slot = i, frame = f, "reclaiming slot, frame left all reference lists");
                        self.slots[i].frame = None;
                    }
                }
            }
            let index = (0..REF_SLOTS)
                .find(|&i| self.slots[i].frame.is_none() && !self.pending_release.contains(&i))
                .ok_or_else(|| {
                    EnchalError::SlotExhausted(format!(
                        "no reference-eligible slot free for {} references",
                        frame.ref_list.len()
                    ))
                })?;
            Ok(SlotSelection {
                index,
                must_wait: false,
            })
        } else {
            // Non-reference ring above the reference-eligible range.
            let index = REF_SLOTS + self.non_ref_cursor;
            self.non_ref_cursor = (self.non_ref_cursor + 1) % self.config.inflight_depth;

            let must_wait = self.slots[index].non_ref_used;
            self.slots[index].non_ref_used = true;

            // A ring slot still pending release is being recycled right
            // here; the wait obligation covers the old contents, so the
            // old-resolution resources can go now.
            if let Some(pos) = self.pending_release.iter().position(|&p| p == index) {
                self.pending_release.remove(pos);
                self.release_slot_resources(index);
            }
            if must_wait {
                warn!(slot = index, "non-reference ring wrapped, caller must synchronize");
            }
            Ok(SlotSelection { index, must_wait })
        }
    }

    /// Allocate the resource families tied to the newly selected slot.
    fn allocate_families(&mut self, index: usize, frame: &FrameParams) -> Result<()> {
        if self.allocate_mb_code {
            let mb_slot = self.policy.mb_code_slot(index);
            self.mb_code_curr_idx = Some(mb_slot);
            self.ensure_buffer(ResourceKind::MbCode, mb_slot as u8, self.seq.mb_code_size())?;
            if let Some(size) = self.policy.mv_data_size(&self.seq) {
                self.ensure_buffer(ResourceKind::MvData, mb_slot as u8, size)?;
            }
        }

        // Temporal MV only matters for slots a future frame can read:
        // reference-eligible ones, plus the synthetic first-frame slot.
        if frame.used_as_ref || self.frames_seen == 0 {
            let size = self.policy.mv_temporal_size(&self.seq);
            self.ensure_buffer(ResourceKind::MvTemporal, index as u8, size)?;
        }

        if self.seq.scaling_enabled {
            self.ensure_surface(ResourceKind::Ds4x, index as u8, self.seq.scaled_dims(4))?;
            if self.seq.scaling_16x_enabled {
                self.ensure_surface(ResourceKind::Ds16x, index as u8, self.seq.scaled_dims(16))?;
            }
            if self.seq.scaling_32x_enabled {
                self.ensure_surface(ResourceKind::Ds32x, index as u8, self.seq.scaled_dims(32))?;
            }
            if self.seq.scaling_2x_enabled {
                self.ensure_surface(ResourceKind::Ds2x, index as u8, self.seq.scaled_dims(2))?;
            }
            if self.policy.needs_recon_pyramid(&self.seq) {
                self.ensure_surface(
                    ResourceKind::Ds4xRecon,
                    index as u8,
                    sizing::recon_dims(&self.seq, 4),
                )?;
                self.ensure_surface(
                    ResourceKind::Ds8xRecon,
                    index as u8,
                    sizing::recon_dims(&self.seq, 8),
                )?;
            }
        }
        Ok(())
    }

    /// Allocate a linear buffer for (kind, index), replacing a smaller
    /// existing one.
    pub(crate) fn ensure_buffer(
        &mut self,
        kind: ResourceKind,
        index: u8,
        size: u64,
    ) -> Result<ResourceHandle> {
        if let Some(rec) = self.alloc.get_record(self.seq.codec, kind, index) {
            if rec.size >= size {
                return Ok(rec.handle.clone());
            }
            self.alloc.release_resource(self.seq.codec, kind, index);
        }
        self.alloc.allocate_resource(&AllocRequest {
            codec: self.seq.codec,
            kind,
            index,
            width: size as u32,
            height: 1,
            zero_on_alloc: true,
            format: SurfaceFormat::Buffer,
            tile: TileMode::Linear,
        })
    }

    /// Allocate a 2-D surface for (kind, index). An existing allocation
    /// is kept unless the new dimensions outgrow it; reallocating
    /// mid-stream forces a GPU synchronization point, so equal-or-larger
    /// surfaces are reused as-is.
    pub(crate) fn ensure_surface(
        &mut self,
        kind: ResourceKind,
        index: u8,
        dims: ScaledDims,
    ) -> Result<ResourceHandle> {
        self.ensure_surface_with_format(kind, index, dims, SurfaceFormat::Nv12)
    }

    pub(crate) fn ensure_surface_with_format(
        &mut self,
        kind: ResourceKind,
        index: u8,
        dims: ScaledDims,
        format: SurfaceFormat,
    ) -> Result<ResourceHandle> {
        if let Some(rec) = self.alloc.get_record(self.seq.codec, kind, index) {
            if rec.width >= dims.width && rec.height >= dims.height && rec.format == format {
                return Ok(rec.handle.clone());
            }
            debug!(?kind, index, "resizing surface in place");
            self.alloc.release_resource(self.seq.codec, kind, index);
        }
        self.alloc.allocate_resource(&AllocRequest {
            codec: self.seq.codec,
            kind,
            index,
            width: dims.width,
            height: dims.height,
            zero_on_alloc: false,
            format,
            tile: TileMode::TileY,
        })
    }

    /// Release every main-family resource held at a slot index.
    fn release_slot_resources(&mut self, index: usize) {
        let codec = self.seq.codec;
        if self.policy.mb_code_follows_main() {
            self.alloc
                .release_resource(codec, ResourceKind::MbCode, index as u8);
            self.alloc
                .release_resource(codec, ResourceKind::MvData, index as u8);
        }
        for kind in [
            ResourceKind::MvTemporal,
            ResourceKind::Ds4x,
            ResourceKind::Ds2x,
            ResourceKind::Ds16x,
            ResourceKind::Ds32x,
            ResourceKind::Ds4xRecon,
            ResourceKind::Ds8xRecon,
        ] {
            self.alloc.release_resource(codec, kind, index as u8);
        }
    }

    /// Resolution-change hook; the owning pipeline calls this exactly
    /// once when it has detected the change, before the next frame.
    ///
    /// Frees every slot's resources except the three most recently
    /// used, which the hardware may still be reading; those drain one
    /// per subsequent frame.
    pub fn resize(&mut self) {
        let retained: SmallVec<[usize; NON_REF_SLOTS]> =
            [self.ante_idx, self.penu_idx, self.curr_idx]
                .into_iter()
                .flatten()
                .collect();

        for i in 0..TRACKED_SLOTS {
            if retained.contains(&i) {
                continue;
            }
            self.release_slot_resources(i);
            self.slots[i].frame = None;
        }

        // oldest first, deduplicated, so each drain step frees exactly
        // the slot that has aged out of the in-flight window
        self.pending_release.clear();
        for idx in retained {
            if !self.pending_release.contains(&idx) {
                self.pending_release.push(idx);
            }
        }
        self.drain_left = self.config.inflight_depth;
        debug!(retained = ?self.pending_release, "resolution change, deferring release of in-flight slots");
    }

    /// One drain step: free the oldest slot still pending from before
    /// the resolution change.
    fn deferred_deallocate_on_res_change(&mut self) {
        if self.pending_release.is_empty() {
            return;
        }
        let index = self.pending_release.remove(0);
        debug!(slot = index, "deferred release of pre-resolution-change slot");
        self.release_slot_resources(index);
        self.slots[index].frame = None;
    }

    // ---- pre-analysis (lookahead) cache ----

    /// Slot selection for out-of-order pre-analysis frames: a direct
    /// associative cache keyed by the external frame index.
    pub fn look_up_buf_index_preenc(&mut self, frame_idx: u8) -> Result<PreencSlot> {
        let home = frame_idx as usize % TRACKED_SLOTS;

        for off in 0..TRACKED_SLOTS {
            let i = (home + off) % TRACKED_SLOTS;
            if self.slots[i].frame == Some(frame_idx) {
                self.slots[i].used_this_frame = true;
                return Ok(PreencSlot {
                    index: i,
                    cache_hit: true,
                });
            }
        }
        for off in 0..TRACKED_SLOTS {
            let i = (home + off) % TRACKED_SLOTS;
            if !self.slots[i].used_this_frame {
                self.slots[i].frame = Some(frame_idx);
                self.slots[i].used_this_frame = true;
                return Ok(PreencSlot {
                    index: i,
                    cache_hit: false,
                });
            }
        }
        Err(EnchalError::SlotExhausted(format!(
            "pre-analysis cache full, frame {}",
            frame_idx
        )))
    }

    /// Pre-analysis variant of the per-frame call: cache probe plus
    /// on-demand 4x surface allocation.
    pub fn allocate_for_curr_frame_preenc(&mut self, frame_idx: u8) -> Result<PreencSlot> {
        let slot = self.look_up_buf_index_preenc(frame_idx)?;
        self.ensure_surface(
            ResourceKind::Ds4x,
            slot.index as u8,
            self.seq.scaled_dims(4),
        )?;
        Ok(slot)
    }

    /// Clear the used-this-batch flags once all of a batch's lookups are
    /// done.
    pub fn reset_used_for_curr_frame(&mut self) {
        for slot in &mut self.slots {
            slot.used_this_frame = false;
        }
    }

    // ---- accessors for command-buffer construction ----

    fn resolve(&self, slot: SlotRef) -> Option<usize> {
        match slot {
            SlotRef::Current => self.curr_idx,
            SlotRef::Index(i) => (i < TRACKED_SLOTS).then_some(i),
        }
    }

    /// Slot chosen for the current frame.
    pub fn get_curr_index(&self) -> Option<usize> {
        self.curr_idx
    }

    /// MB-code slot chosen for the current frame (policy-dependent).
    pub fn get_curr_index_mb_code(&self) -> Option<usize> {
        self.mb_code_curr_idx
    }

    /// Must-synchronize flag from the latest main-family selection.
    pub fn get_wait(&self) -> bool {
        self.wait_main
    }

    /// Must-synchronize flag from the latest CSC selection.
    pub fn get_wait_csc(&self) -> bool {
        self.wait_csc
    }

    pub fn ds_surface_4x(&self, slot: SlotRef) -> Option<ResourceHandle> {
        self.surface(ResourceKind::Ds4x, slot)
    }

    pub fn ds_surface_2x(&self, slot: SlotRef) -> Option<ResourceHandle> {
        self.surface(ResourceKind::Ds2x, slot)
    }

    pub fn ds_surface_16x(&self, slot: SlotRef) -> Option<ResourceHandle> {
        self.surface(ResourceKind::Ds16x, slot)
    }

    pub fn ds_surface_32x(&self, slot: SlotRef) -> Option<ResourceHandle> {
        self.surface(ResourceKind::Ds32x, slot)
    }

    pub fn recon_surface_4x(&self, slot: SlotRef) -> Option<ResourceHandle> {
        self.surface(ResourceKind::Ds4xRecon, slot)
    }

    pub fn recon_surface_8x(&self, slot: SlotRef) -> Option<ResourceHandle> {
        self.surface(ResourceKind::Ds8xRecon, slot)
    }

    pub fn mv_temporal_buffer(&self, slot: SlotRef) -> Option<ResourceHandle> {
        self.surface(ResourceKind::MvTemporal, slot)
    }

    pub fn curr_mb_code_buffer(&self) -> Option<ResourceHandle> {
        let idx = self.mb_code_curr_idx?;
        self.alloc
            .get_resource(self.seq.codec, ResourceKind::MbCode, idx as u8)
    }

    pub fn curr_mv_data_buffer(&self) -> Option<ResourceHandle> {
        let idx = self.mb_code_curr_idx?;
        self.alloc
            .get_resource(self.seq.codec, ResourceKind::MvData, idx as u8)
    }

    fn surface(&self, kind: ResourceKind, slot: SlotRef) -> Option<ResourceHandle> {
        let idx = self.resolve(slot)?;
        self.alloc.get_resource(self.seq.codec, kind, idx as u8)
    }

    // ---- state inspection ----

    /// Frame occupying a slot, if any.
    pub fn slot_frame(&self, index: usize) -> Option<u8> {
        self.slots.get(index).and_then(|s| s.frame)
    }

    pub fn is_slot_free(&self, index: usize) -> bool {
        self.slots.get(index).map_or(false, |s| s.frame.is_none())
    }

    /// Slots still holding pre-resolution-change resources.
    pub fn pending_release_slots(&self) -> &[usize] {
        &self.pending_release
    }
}
