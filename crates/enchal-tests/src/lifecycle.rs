//! Tracked-buffer lifecycle scenarios: reference retention, lazy
//! reclamation and the non-reference ring.

use crate::common::{non_ref_frame, ref_frame, seq_1080p, session};
use enchal_core::CodecStandard;
use enchal_encode::{SlotRef, REF_SLOTS};

/// Reference retention invariant: two frames present in the same
/// reference list never share a slot, and a slot is never reassigned
/// while its frame remains in the most recent list.
#[test]
fn referenced_frames_keep_distinct_slots() {
    let (mut tb, _) = session(seq_1080p(CodecStandard::Avc));

    // IBBP-style pattern with depth-2 lists
    tb.allocate_for_curr_frame(&ref_frame(0, &[])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(1, &[0])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(2, &[0, 1])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(3, &[1, 2])).unwrap();

    let mut seen = std::collections::HashSet::new();
    for i in 0..REF_SLOTS {
        if let Some(frame) = tb.slot_frame(i) {
            assert!(seen.insert(frame), "frame {} occupies two slots", frame);
        }
    }
    // frames 1, 2, 3 are live (1 and 2 via the last list, 3 as current)
    assert!([1u8, 2, 3].iter().all(|f| seen.contains(f)));
    // frame 0 left every list when frame 3 was processed
    assert!(!seen.contains(&0));
}

/// Scenario B: with depth-2 lists, frame 2's slot goes Free exactly
/// when frame 4's list (the first without frame 2) is processed.
#[test]
fn slot_freed_exactly_when_reference_list_drops_the_frame() {
    let (mut tb, _) = session(seq_1080p(CodecStandard::Avc));

    tb.allocate_for_curr_frame(&ref_frame(0, &[])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(1, &[0])).unwrap();
    let slot2 = tb.allocate_for_curr_frame(&ref_frame(2, &[0, 1])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(3, &[1, 2])).unwrap();
    // frame 2 still referenced by frame 3's list
    assert_eq!(tb.slot_frame(slot2.index), Some(2));

    // frame 4's list no longer contains frame 2
    tb.allocate_for_curr_frame(&ref_frame(4, &[3])).unwrap();
    assert_ne!(tb.slot_frame(slot2.index), Some(2));
}

/// Ring-wrap wait flag: false until a ring slot is handed out a second
/// time, true from then on, and reference frames in between do not
/// reset it.
#[test]
fn ring_wrap_raises_must_wait() {
    let (mut tb, _) = session(seq_1080p(CodecStandard::Avc));

    let mut waits = Vec::new();
    for i in 0..3u8 {
        waits.push(tb.allocate_for_curr_frame(&non_ref_frame(i)).unwrap());
    }
    assert!(waits.iter().all(|s| !s.must_wait));

    // a reference frame in between leaves the ring untouched
    tb.allocate_for_curr_frame(&ref_frame(3, &[])).unwrap();
    assert!(!tb.get_wait());

    let wrapped = tb.allocate_for_curr_frame(&non_ref_frame(4)).unwrap();
    assert_eq!(wrapped.index, waits[0].index);
    assert!(wrapped.must_wait);
    assert!(tb.get_wait());
}

/// The pre-analysis cache across two batches of out-of-order frames.
#[test]
fn preenc_batches_reuse_cached_surfaces() {
    let (mut tb, _) = session(seq_1080p(CodecStandard::Avc));

    // first batch: current frame 4 with its past and future references
    let cur = tb.allocate_for_curr_frame_preenc(4).unwrap();
    let past = tb.allocate_for_curr_frame_preenc(2).unwrap();
    let future = tb.allocate_for_curr_frame_preenc(6).unwrap();
    assert!(!cur.cache_hit && !past.cache_hit && !future.cache_hit);
    tb.reset_used_for_curr_frame();

    // second batch, one frame later: 2 and 6 hit, 8 misses
    let cur = tb.allocate_for_curr_frame_preenc(6).unwrap();
    let past = tb.allocate_for_curr_frame_preenc(2).unwrap();
    let fresh = tb.allocate_for_curr_frame_preenc(8).unwrap();
    assert!(cur.cache_hit && past.cache_hit);
    assert_eq!(cur.index, future.index);
    assert!(!fresh.cache_hit);

    // the cached slot keeps its downscaled surface
    assert!(tb.ds_surface_4x(SlotRef::Index(cur.index)).is_some());
}

/// CSC ring mode: independent slots while the raw surface is never a
/// reference, with the device fenced on wrap.
#[test]
fn csc_ring_waits_on_wrap_and_fences_once_acknowledged() {
    let (mut tb, device) = session(seq_1080p(CodecStandard::Avc));

    for i in 0..3u8 {
        tb.allocate_for_curr_frame(&non_ref_frame(i)).unwrap();
        let sel = tb.allocate_surface_csc().unwrap();
        assert!(!sel.must_wait);
    }

    tb.allocate_for_curr_frame(&non_ref_frame(3)).unwrap();
    let wrapped = tb.allocate_surface_csc().unwrap();
    assert!(wrapped.must_wait);
    assert!(tb.get_wait_csc());

    assert_eq!(device.stats().sync_count, 0);
    tb.wait_csc_surface();
    assert_eq!(device.stats().sync_count, 1);
    assert!(!tb.get_wait_csc());

    // acknowledging twice does not fence twice
    tb.wait_csc_surface();
    assert_eq!(device.stats().sync_count, 1);
}

/// In aliased mode a CSC request before the frame's tracked slot is an
/// error and must leave the CSC history untouched.
#[test]
fn csc_request_before_slot_selection_fails_cleanly() {
    let mut seq = seq_1080p(CodecStandard::Avc);
    seq.use_raw_for_ref = true;
    let (mut tb, _) = session(seq);

    assert!(tb.allocate_surface_csc().is_err());
    assert_eq!(tb.get_curr_index_csc(), None);

    tb.allocate_for_curr_frame(&ref_frame(0, &[])).unwrap();
    let sel = tb.allocate_surface_csc().unwrap();
    assert_eq!(tb.get_curr_index_csc(), Some(sel.index));
}

/// CSC aliased mode: when the raw surface can be a reference, the copy
/// lives in the same slot as the main tracked buffer.
#[test]
fn csc_aliases_tracked_slot_when_raw_is_reference() {
    let mut seq = seq_1080p(CodecStandard::Avc);
    seq.use_raw_for_ref = true;
    let (mut tb, _) = session(seq);

    let main = tb.allocate_for_curr_frame(&ref_frame(0, &[])).unwrap();
    let csc = tb.allocate_surface_csc().unwrap();
    assert_eq!(csc.index, main.index);
    assert_eq!(tb.get_curr_index_csc(), tb.get_curr_index());
    assert!(tb.csc_surface(SlotRef::Current).is_some());
}
