//! Enchal Alloc - tag-addressed resource allocation
//!
//! Maps a compact identifier (codec, resource kind, sub-index) to a
//! durable hardware resource handle. The tag is the sole lookup key: no
//! resource is reachable except by recomputing its tag from the same
//! triple. Frame-lifetime policy lives one layer up, in `enchal-encode`.

pub mod allocator;
pub mod device;
pub mod tag;

pub use allocator::{AllocRequest, ResourceAllocator, ResourceRecord};
pub use device::{AllocShape, Device, DeviceStats, ResourceHandle, SystemDevice};
pub use tag::{ResourceClass, ResourceKind, ResourceTag};
