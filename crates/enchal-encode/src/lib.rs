//! Enchal Encode - tracked-buffer lifecycle management
//!
//! Decides, once per frame, which slot each per-frame resource family
//! lives in (motion data, CSC copies, downscaled pyramids), based on
//! whether the frame stays a reference picture. Slot reuse is structured
//! so nothing is freed or recycled while the asynchronous hardware
//! pipeline may still be reading it: reference slots are reclaimed only
//! when a newer reference list proves the old frame unreachable, and
//! everything else rotates through short rings with an explicit
//! synchronize-before-use obligation on wrap.

pub mod policy;
pub mod sizing;
pub mod tracked;

mod csc;

pub use policy::{AvcPolicy, CodecPolicy, HevcPolicy};
pub use tracked::{
    FrameParams, PreencSlot, SessionConfig, SlotRef, SlotSelection, TrackedBuffer, MAX_REF_FRAMES,
    NON_REF_SLOTS, REF_SLOTS, TRACKED_SLOTS,
};
