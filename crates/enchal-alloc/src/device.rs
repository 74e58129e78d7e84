//! The platform allocation seam.
//!
//! The allocator never talks to driver memory directly; it goes through
//! [`Device`]. Production builds wire a real driver here, tests and
//! software paths use [`SystemDevice`], which backs every allocation
//! with host memory and keeps live-allocation accounting.

use crate::tag::ResourceClass;
use enchal_core::{EnchalError, Result, SurfaceFormat, TileMode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Fully classified allocation request handed to the device.
#[derive(Debug, Clone, Copy)]
pub struct AllocShape {
    pub class: ResourceClass,
    /// Byte size for 1-D and batch allocations; derived plane size for
    /// 2-D surfaces.
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub format: SurfaceFormat,
    pub tile: TileMode,
    pub zero_on_alloc: bool,
}

struct Allocation {
    id: u64,
    shape: AllocShape,
    // Host backing store standing in for driver memory.
    #[allow(dead_code)]
    storage: Mutex<Vec<u8>>,
}

/// Cheap-clone opaque handle to one device allocation.
///
/// Two handles compare equal exactly when they refer to the same
/// underlying allocation, which is what the idempotent-fetch contract
/// of the allocator is stated in terms of.
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Arc<Allocation>,
}

impl ResourceHandle {
    /// Unique id of the underlying allocation.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Shape the allocation was created with.
    pub fn shape(&self) -> &AllocShape {
        &self.inner.shape
    }

    pub fn size(&self) -> u64 {
        self.inner.shape.size
    }

    pub fn width(&self) -> u32 {
        self.inner.shape.width
    }

    pub fn height(&self) -> u32 {
        self.inner.shape.height
    }

    /// Whether `self` and `other` refer to the same allocation.
    pub fn same_allocation(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.inner.id)
            .field("class", &self.inner.shape.class)
            .field("size", &self.inner.shape.size)
            .finish()
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_allocation(other)
    }
}

impl Eq for ResourceHandle {}

/// Platform allocation primitive.
pub trait Device {
    /// Allocate memory for a classified shape.
    fn alloc(&self, shape: &AllocShape) -> Result<ResourceHandle>;

    /// Return memory to the platform. Outstanding handle clones keep the
    /// backing store alive; the device only drops its accounting.
    fn free(&self, handle: &ResourceHandle);

    /// Block until the hardware timeline has drained past any submission
    /// that may still reference previously handed-out memory. Called
    /// only when a must-wait obligation was raised.
    fn synchronize(&self);
}

/// Host-memory device for tests and software fallback paths.
#[derive(Default)]
pub struct SystemDevice {
    next_id: AtomicU64,
    stats: Mutex<DeviceStats>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceStats {
    pub live_allocations: usize,
    pub live_bytes: u64,
    pub sync_count: u64,
}

impl SystemDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of live allocation accounting.
    pub fn stats(&self) -> DeviceStats {
        *self.stats.lock()
    }
}

impl Device for SystemDevice {
    fn alloc(&self, shape: &AllocShape) -> Result<ResourceHandle> {
        if shape.size == 0 {
            return Err(EnchalError::InvalidParameter(
                "zero-size allocation".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let storage = if shape.zero_on_alloc {
            vec![0u8; shape.size as usize]
        } else {
            Vec::with_capacity(shape.size as usize)
        };

        {
            let mut stats = self.stats.lock();
            stats.live_allocations += 1;
            stats.live_bytes += shape.size;
        }
        debug!(id, size = shape.size, class = ?shape.class, "device alloc");

        Ok(ResourceHandle {
            inner: Arc::new(Allocation {
                id,
                shape: *shape,
                storage: Mutex::new(storage),
            }),
        })
    }

    fn free(&self, handle: &ResourceHandle) {
        let mut stats = self.stats.lock();
        stats.live_allocations = stats.live_allocations.saturating_sub(1);
        stats.live_bytes = stats.live_bytes.saturating_sub(handle.size());
        debug!(id = handle.id(), "device free");
    }

    fn synchronize(&self) {
        // Host memory has no asynchronous consumer; count the call so
        // tests can assert the obligation was honored.
        self.stats.lock().sync_count += 1;
    }
}
