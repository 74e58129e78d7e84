//! Allocator-level scenarios: tag identity and idempotent allocation.

use enchal_alloc::{AllocRequest, ResourceAllocator, ResourceKind, ResourceTag, SystemDevice};
use enchal_core::{CodecStandard, SurfaceFormat, TileMode};
use std::sync::Arc;

/// Scenario A: allocate a 1080p 4x downscaled surface, request it again
/// with identical parameters. Same handle both times, and the size query
/// reports the original allocation rather than zero.
#[test]
fn repeated_ds_allocation_returns_the_original() {
    let mut alloc = ResourceAllocator::new(Arc::new(SystemDevice::new()));
    let req = AllocRequest {
        codec: CodecStandard::Avc,
        kind: ResourceKind::Ds4x,
        index: 0,
        width: 480,
        height: 272,
        zero_on_alloc: false,
        format: SurfaceFormat::Nv12,
        tile: TileMode::TileY,
    };

    let first = alloc.allocate_resource(&req).unwrap();
    let second = alloc.allocate_resource(&req).unwrap();

    assert!(first.same_allocation(&second));
    assert_eq!(alloc.live_resources(), 1);
    assert_eq!(
        alloc.get_resource_size(CodecStandard::Avc, ResourceKind::Ds4x, 0),
        SurfaceFormat::Nv12.surface_size(480, 272)
    );
}

/// Tag uniqueness across codec, kind and index; relaxed decode makes
/// tags differing only in index compare equal.
#[test]
fn tags_are_unique_and_family_match_ignores_index() {
    let a = ResourceTag::new(CodecStandard::Avc, ResourceKind::MbCode, 4);
    let b = ResourceTag::new(CodecStandard::Hevc, ResourceKind::MbCode, 4);
    let c = ResourceTag::new(CodecStandard::Avc, ResourceKind::MvData, 4);
    let d = ResourceTag::new(CodecStandard::Avc, ResourceKind::MbCode, 5);

    let encodings = [a.encode(), b.encode(), c.encode(), d.encode()];
    for (i, x) in encodings.iter().enumerate() {
        for y in &encodings[i + 1..] {
            assert_ne!(x, y);
        }
    }

    assert_eq!(
        ResourceTag::decode_family(a.encode()).unwrap(),
        ResourceTag::decode_family(d.encode()).unwrap()
    );
    assert_ne!(
        ResourceTag::decode_family(a.encode()).unwrap(),
        ResourceTag::decode_family(b.encode()).unwrap()
    );
}

/// A released tag frees device memory and subsequent lookups miss.
#[test]
fn release_then_lookup_misses() {
    let device = Arc::new(SystemDevice::new());
    let mut alloc = ResourceAllocator::new(device.clone());
    alloc
        .allocate_resource(&AllocRequest {
            codec: CodecStandard::Vp9,
            kind: ResourceKind::MvTemporal,
            index: 2,
            width: 16384,
            height: 1,
            zero_on_alloc: true,
            format: SurfaceFormat::Buffer,
            tile: TileMode::Linear,
        })
        .unwrap();
    assert_eq!(device.stats().live_allocations, 1);

    alloc.release_resource(CodecStandard::Vp9, ResourceKind::MvTemporal, 2);
    assert!(alloc
        .get_resource(CodecStandard::Vp9, ResourceKind::MvTemporal, 2)
        .is_none());
    assert_eq!(
        alloc.get_resource_size(CodecStandard::Vp9, ResourceKind::MvTemporal, 2),
        0
    );
    assert_eq!(device.stats().live_allocations, 0);
}
