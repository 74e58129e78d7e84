//! Resolution-change scenarios: the bounded three-frame drain.

use crate::common::{non_ref_frame, ref_frame, seq_1080p, session};
use enchal_alloc::ResourceKind;
use enchal_core::CodecStandard;
use enchal_encode::SlotRef;

/// Three-deep drain: after a resolution change followed by exactly
/// three frames, every pre-change slot except the three that were most
/// recent at the change has been Free all along, and all pre-change
/// resources are released.
#[test]
fn drain_completes_after_exactly_three_frames() {
    let (mut tb, _) = session(seq_1080p(CodecStandard::Avc));
    let codec = CodecStandard::Avc;

    // build up five tracked slots, frames 0..=4 all still referenced
    tb.allocate_for_curr_frame(&ref_frame(0, &[])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(1, &[0])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(2, &[0, 1])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(3, &[0, 1, 2])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(4, &[0, 1, 2, 3])).unwrap();

    let mut bigger = *tb.sequence();
    bigger.frame_width = 3840;
    bigger.frame_height = 2160;
    tb.set_sequence(bigger);
    tb.resize();

    // slots 0 and 1 were outside the in-flight window: freed immediately
    assert_eq!(tb.allocator().get_resource_size(codec, ResourceKind::Ds4x, 0), 0);
    assert_eq!(tb.allocator().get_resource_size(codec, ResourceKind::Ds4x, 1), 0);
    // the three most recent (2, 3, 4) are retained
    assert_eq!(tb.pending_release_slots(), &[2, 3, 4]);

    for i in 0..3u8 {
        tb.allocate_for_curr_frame(&non_ref_frame(10 + i)).unwrap();
    }

    assert!(tb.pending_release_slots().is_empty());
    for idx in 2..=4u8 {
        assert_eq!(
            tb.allocator().get_resource_size(codec, ResourceKind::Ds4x, idx),
            0
        );
        assert_eq!(
            tb.allocator()
                .get_resource_size(codec, ResourceKind::MvTemporal, idx),
            0
        );
    }
}

/// Scenario C: the two most recent pre-change frames keep resolving to
/// their pre-change surfaces while the drain has not reached them, and
/// are gone once it has.
#[test]
fn recent_slots_survive_into_the_drain_window() {
    let (mut tb, _) = session(seq_1080p(CodecStandard::Avc));

    tb.allocate_for_curr_frame(&ref_frame(0, &[])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(1, &[0])).unwrap();
    tb.allocate_for_curr_frame(&ref_frame(2, &[0, 1])).unwrap();
    let ds_1 = tb.ds_surface_4x(SlotRef::Index(1)).unwrap();
    let ds_2 = tb.ds_surface_4x(SlotRef::Index(2)).unwrap();

    let mut bigger = *tb.sequence();
    bigger.frame_width = 3840;
    bigger.frame_height = 2160;
    tb.set_sequence(bigger);
    tb.resize();

    // first post-change frame drains slot 0 only; frames N-1 and N-2
    // still resolve to their old surfaces
    tb.allocate_for_curr_frame(&non_ref_frame(3)).unwrap();
    assert!(tb.ds_surface_4x(SlotRef::Index(0)).is_none());
    assert!(ds_1.same_allocation(&tb.ds_surface_4x(SlotRef::Index(1)).unwrap()));
    assert!(ds_2.same_allocation(&tb.ds_surface_4x(SlotRef::Index(2)).unwrap()));

    // second post-change frame ages out frame N-2
    tb.allocate_for_curr_frame(&non_ref_frame(4)).unwrap();
    assert!(tb.ds_surface_4x(SlotRef::Index(1)).is_none());
    assert!(ds_2.same_allocation(&tb.ds_surface_4x(SlotRef::Index(2)).unwrap()));

    // third post-change frame finishes the drain
    tb.allocate_for_curr_frame(&non_ref_frame(5)).unwrap();
    assert!(tb.ds_surface_4x(SlotRef::Index(2)).is_none());
    assert!(tb.is_slot_free(2));
}

/// New-resolution allocations happen at the new size while the drain is
/// still in progress.
#[test]
fn post_change_frames_allocate_at_the_new_size() {
    let (mut tb, _) = session(seq_1080p(CodecStandard::Avc));
    tb.allocate_for_curr_frame(&ref_frame(0, &[])).unwrap();
    let old = tb.ds_surface_4x(SlotRef::Current).unwrap();

    let mut bigger = *tb.sequence();
    bigger.frame_width = 3840;
    bigger.frame_height = 2160;
    tb.set_sequence(bigger);
    tb.resize();

    let sel = tb.allocate_for_curr_frame(&non_ref_frame(1)).unwrap();
    let fresh = tb.ds_surface_4x(SlotRef::Index(sel.index)).unwrap();
    assert!(fresh.width() > old.width());
}

/// The CSC family drains independently with its own three-deep window.
#[test]
fn csc_family_drains_with_its_own_history() {
    let (mut tb, _) = session(seq_1080p(CodecStandard::Avc));
    let codec = CodecStandard::Avc;

    for i in 0..3u8 {
        tb.allocate_for_curr_frame(&non_ref_frame(i)).unwrap();
        tb.allocate_surface_csc().unwrap();
    }
    for idx in 0..3u8 {
        assert!(
            tb.allocator()
                .get_resource_size(codec, ResourceKind::CscSurface, idx)
                > 0
        );
    }

    let mut bigger = *tb.sequence();
    bigger.frame_width = 3840;
    bigger.frame_height = 2160;
    tb.set_sequence(bigger);
    tb.resize();
    tb.resize_csc();

    // all three CSC slots are within the retention window; each
    // subsequent frame recycles one under the wait obligation
    tb.allocate_for_curr_frame(&non_ref_frame(3)).unwrap();
    let sel = tb.allocate_surface_csc().unwrap();
    assert!(sel.must_wait);
    let handle = tb.csc_surface(SlotRef::Current).unwrap();
    assert!(handle.width() >= 3840);
}
