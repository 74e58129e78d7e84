//! Enchal Core - Foundation types for the encoder resource HAL
//!
//! This crate provides the fundamental types used throughout enchal:
//! - Error type and Result alias
//! - Codec standard, chroma format and bit depth enumerations
//! - Surface formats and tile modes
//! - Sequence-level sizing parameters and alignment helpers

pub mod error;
pub mod format;
pub mod params;

pub use error::{EnchalError, Result};
pub use format::{BitDepth, ChromaFormat, CodecStandard, SurfaceFormat, TileMode};
pub use params::{ScaledDims, SequenceParams};

/// Block and alignment constants shared by the sizing math.
pub mod geom {
    /// Macroblock width in pixels.
    pub const MB_WIDTH: u32 = 16;

    /// Macroblock height in pixels.
    pub const MB_HEIGHT: u32 = 16;

    /// Largest coding unit edge (HEVC).
    pub const MAX_LCU_SIZE: u32 = 64;

    /// GPU cacheline in bytes.
    pub const CACHELINE: u32 = 64;

    /// Allocation page size in bytes.
    pub const PAGE_SIZE: u32 = 4096;

    /// Downscaled surfaces never shrink below this edge; the motion
    /// estimation kernels cannot walk anything smaller.
    pub const MIN_SCALED_DIMENSION: u32 = 48;

    /// Round `value` up to a multiple of `align` (power of two not required).
    pub const fn align_up(value: u32, align: u32) -> u32 {
        ((value + align - 1) / align) * align
    }

    /// Width in macroblocks, rounded up.
    pub const fn width_in_mbs(width: u32) -> u32 {
        (width + MB_WIDTH - 1) / MB_WIDTH
    }

    /// Height in macroblocks, rounded up.
    pub const fn height_in_mbs(height: u32) -> u32 {
        (height + MB_HEIGHT - 1) / MB_HEIGHT
    }
}
