//! The CSC/copy surface family.
//!
//! Color-converted (or plain copied) raw surfaces have two possible
//! lifetimes. When the raw surface itself can land in a reference list,
//! the copy must live exactly as long as the reference, so it aliases
//! the main tracked slot. When it cannot, the copy only has to survive
//! until the encode/PAK stages consume it, and a short independent ring
//! is enough.

use crate::sizing;
use crate::tracked::{SlotRef, SlotSelection, TrackedBuffer, NON_REF_SLOTS, TRACKED_SLOTS};
use enchal_alloc::{Device, ResourceHandle, ResourceKind};
use enchal_core::{EnchalError, Result};
use smallvec::SmallVec;
use tracing::{debug, warn};

impl<D: Device> TrackedBuffer<D> {
    /// Select a slot for the current frame's CSC copy and allocate the
    /// surface if absent (resizing in place when the raw frame grew).
    /// In aliased mode this must run after `allocate_for_curr_frame`.
    pub fn allocate_surface_csc(&mut self) -> Result<SlotSelection> {
        if self.csc_drain_left > 0 {
            self.deferred_deallocate_csc();
            self.csc_drain_left -= 1;
        }

        let selection = if self.seq.use_raw_for_ref {
            // the copy's lifetime is the reference's lifetime
            let index = self.get_curr_index().ok_or_else(|| {
                EnchalError::InvalidParameter(
                    "CSC surface requested before the frame's tracked slot".to_string(),
                )
            })?;
            SlotSelection {
                index,
                // the main selection's obligation covers this slot
                must_wait: self.get_wait(),
            }
        } else {
            let ring = self.csc_ring_cursor;
            self.csc_ring_cursor = (ring + 1) % self.config.inflight_depth;

            let must_wait = self.csc_ring_used[ring];
            self.csc_ring_used[ring] = true;

            if let Some(pos) = self.csc_pending_release.iter().position(|&p| p == ring) {
                // recycled under the wait obligation; the old-resolution
                // surface can go now
                self.csc_pending_release.remove(pos);
                self.alloc
                    .release_resource(self.seq.codec, ResourceKind::CscSurface, ring as u8);
            }
            if must_wait {
                warn!(slot = ring, "CSC ring wrapped, caller must synchronize");
            }
            SlotSelection {
                index: ring,
                must_wait,
            }
        };

        self.csc_ante_idx = self.csc_penu_idx;
        self.csc_penu_idx = self.csc_curr_idx;
        self.csc_curr_idx = Some(selection.index);
        self.wait_csc = selection.must_wait;

        let format = self.seq.csc_format();
        self.ensure_surface_with_format(
            ResourceKind::CscSurface,
            selection.index as u8,
            sizing::csc_dims(&self.seq),
            format,
        )?;
        Ok(selection)
    }

    /// The one blocking point in the subsystem. The owning pipeline
    /// calls this only when the latest CSC selection raised the wait
    /// obligation.
    pub fn wait_csc_surface(&mut self) {
        if self.wait_csc {
            debug!("synchronizing before CSC surface reuse");
            self.alloc.device().synchronize();
            self.wait_csc = false;
        }
    }

    /// Resolution-change hook for the CSC family, mirroring
    /// [`resize`](Self::resize): the three most recent CSC slots drain
    /// one per subsequent frame.
    pub fn resize_csc(&mut self) {
        let retained: SmallVec<[usize; NON_REF_SLOTS]> =
            [self.csc_ante_idx, self.csc_penu_idx, self.csc_curr_idx]
                .into_iter()
                .flatten()
                .collect();

        for i in 0..TRACKED_SLOTS {
            if retained.contains(&i) {
                continue;
            }
            self.alloc
                .release_resource(self.seq.codec, ResourceKind::CscSurface, i as u8);
        }

        self.csc_pending_release.clear();
        for idx in retained {
            if !self.csc_pending_release.contains(&idx) {
                self.csc_pending_release.push(idx);
            }
        }
        self.csc_drain_left = self.config.inflight_depth;
        debug!(retained = ?self.csc_pending_release, "CSC resolution change, deferring release");
    }

    fn deferred_deallocate_csc(&mut self) {
        if self.csc_pending_release.is_empty() {
            return;
        }
        let index = self.csc_pending_release.remove(0);
        debug!(slot = index, "deferred release of pre-resolution-change CSC surface");
        self.alloc
            .release_resource(self.seq.codec, ResourceKind::CscSurface, index as u8);
    }

    /// CSC slot chosen for the current frame.
    pub fn get_curr_index_csc(&self) -> Option<usize> {
        self.csc_curr_idx
    }

    /// CSC surface handle by slot. `Current` resolves against the CSC
    /// family's own history, not the main tracked one.
    pub fn csc_surface(&self, slot: SlotRef) -> Option<ResourceHandle> {
        let idx = match slot {
            SlotRef::Current => self.csc_curr_idx?,
            SlotRef::Index(i) if i < TRACKED_SLOTS => i,
            SlotRef::Index(_) => return None,
        };
        self.alloc
            .get_resource(self.seq.codec, ResourceKind::CscSurface, idx as u8)
    }
}
