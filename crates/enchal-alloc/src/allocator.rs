//! The tag-addressed allocator.
//!
//! Turns (codec, kind, sub-index, shape) into a durable resource and
//! answers exact-match retrieval, size queries and release over the same
//! triple. Allocation is idempotent in the "resource already exists"
//! sense: a second request for a live tag returns the existing handle
//! untouched.

use crate::device::{AllocShape, Device, ResourceHandle};
use crate::tag::{ResourceClass, ResourceKind, ResourceTag};
use enchal_core::{CodecStandard, EnchalError, Result, SurfaceFormat, TileMode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One allocation request, pre-classification.
#[derive(Debug, Clone, Copy)]
pub struct AllocRequest {
    pub codec: CodecStandard,
    pub kind: ResourceKind,
    pub index: u8,
    /// Byte size for 1-D/batch kinds, pixel width for surfaces.
    pub width: u32,
    /// Ignored for 1-D/batch kinds.
    pub height: u32,
    pub zero_on_alloc: bool,
    pub format: SurfaceFormat,
    pub tile: TileMode,
}

/// What the allocator remembers about a live resource: enough to hand
/// back a surface descriptor on a cache hit without re-asking the
/// device.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub tag: ResourceTag,
    pub handle: ResourceHandle,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub format: SurfaceFormat,
    pub tile: TileMode,
}

/// Tag-addressed resource table. One instance per encode session.
pub struct ResourceAllocator<D: Device> {
    device: Arc<D>,
    records: HashMap<u16, ResourceRecord>,
}

impl<D: Device> ResourceAllocator<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            records: HashMap::new(),
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Classify the requested shape. An unmappable format/tile
    /// combination, or one inconsistent with the kind's dimensionality,
    /// is a caller-contract violation.
    fn classify(req: &AllocRequest) -> Result<AllocShape> {
        let class = match (req.format, req.tile) {
            (SurfaceFormat::Buffer, TileMode::Linear) => ResourceClass::Buffer1D,
            (SurfaceFormat::BatchBuffer, TileMode::Linear) => ResourceClass::Batch,
            (f, _) if f.is_pixel_format() => ResourceClass::Surface2D,
            (f, t) => {
                return Err(EnchalError::UnsupportedFormat(format!(
                    "{:?} with tile mode {:?}",
                    f, t
                )))
            }
        };
        if class != req.kind.class() {
            return Err(EnchalError::UnsupportedFormat(format!(
                "{:?} requested as {:?} but kind {:?} is {:?}",
                req.format,
                class,
                req.kind,
                req.kind.class()
            )));
        }
        let size = match class {
            ResourceClass::Buffer1D | ResourceClass::Batch => req.width as u64,
            ResourceClass::Surface2D => req.format.surface_size(req.width, req.height),
        };
        Ok(AllocShape {
            class,
            size,
            width: req.width,
            height: req.height,
            format: req.format,
            tile: req.tile,
            zero_on_alloc: req.zero_on_alloc,
        })
    }

    /// Allocate a resource for the tag computed from (codec, kind,
    /// index), or return the live handle if one already exists.
    pub fn allocate_resource(&mut self, req: &AllocRequest) -> Result<ResourceHandle> {
        let tag = ResourceTag::new(req.codec, req.kind, req.index);
        if let Some(record) = self.records.get(&tag.encode()) {
            return Ok(record.handle.clone());
        }

        let shape = match Self::classify(req) {
            Ok(shape) => shape,
            Err(e) => {
                warn!(?tag, %e, "rejecting unclassifiable allocation request");
                return Err(e);
            }
        };

        let handle = self.device.alloc(&shape)?;
        debug!(?tag, size = shape.size, class = ?shape.class, "allocated resource");
        self.records.insert(
            tag.encode(),
            ResourceRecord {
                tag,
                handle: handle.clone(),
                width: shape.width,
                height: shape.height,
                size: shape.size,
                format: shape.format,
                tile: shape.tile,
            },
        );
        Ok(handle)
    }

    /// Pure lookup at the full match level; no allocation side effect.
    pub fn get_resource(
        &self,
        codec: CodecStandard,
        kind: ResourceKind,
        index: u8,
    ) -> Option<ResourceHandle> {
        let tag = ResourceTag::new(codec, kind, index);
        self.records.get(&tag.encode()).map(|r| r.handle.clone())
    }

    /// Full record for a present tag.
    pub fn get_record(
        &self,
        codec: CodecStandard,
        kind: ResourceKind,
        index: u8,
    ) -> Option<&ResourceRecord> {
        let tag = ResourceTag::new(codec, kind, index);
        self.records.get(&tag.encode())
    }

    /// Recorded size for a present tag, else 0.
    pub fn get_resource_size(&self, codec: CodecStandard, kind: ResourceKind, index: u8) -> u64 {
        self.get_record(codec, kind, index).map_or(0, |r| r.size)
    }

    /// Free the resource and drop its record. No-op when absent.
    pub fn release_resource(&mut self, codec: CodecStandard, kind: ResourceKind, index: u8) {
        let tag = ResourceTag::new(codec, kind, index);
        if let Some(record) = self.records.remove(&tag.encode()) {
            debug!(?tag, "released resource");
            self.device.free(&record.handle);
        }
    }

    /// Relaxed-match existence check: does any instance of this
    /// (codec, kind) family exist, regardless of sub-index.
    pub fn family_exists(&self, codec: CodecStandard, kind: ResourceKind) -> bool {
        let family = ResourceTag::new(codec, kind, 0).family();
        self.records.values().any(|r| r.tag.family() == family)
    }

    /// Total recorded size across every instance of the family.
    pub fn family_size(&self, codec: CodecStandard, kind: ResourceKind) -> u64 {
        let family = ResourceTag::new(codec, kind, 0).family();
        self.records
            .values()
            .filter(|r| r.tag.family() == family)
            .map(|r| r.size)
            .sum()
    }

    /// Number of live records, all families.
    pub fn live_resources(&self) -> usize {
        self.records.len()
    }
}

impl<D: Device> Drop for ResourceAllocator<D> {
    fn drop(&mut self) {
        for record in self.records.values() {
            self.device.free(&record.handle);
        }
    }
}
