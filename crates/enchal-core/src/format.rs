//! Codec, chroma and surface format enumerations.

use serde::{Deserialize, Serialize};

/// Encoder standard owning a resource instance.
///
/// Distinguishes identical resource kinds allocated by different codec
/// pipelines sharing one allocator. Encoded as a 3-bit field in the
/// resource tag, so at most 8 variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecStandard {
    Avc,
    Hevc,
    Vp9,
    Av1,
}

impl CodecStandard {
    /// 3-bit tag field value.
    pub const fn to_bits(self) -> u16 {
        match self {
            Self::Avc => 0,
            Self::Hevc => 1,
            Self::Vp9 => 2,
            Self::Av1 => 3,
        }
    }

    /// Inverse of [`to_bits`](Self::to_bits).
    pub const fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0 => Some(Self::Avc),
            1 => Some(Self::Hevc),
            2 => Some(Self::Vp9),
            3 => Some(Self::Av1),
            _ => None,
        }
    }
}

/// Chroma subsampling of the raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChromaFormat {
    Monochrome,
    #[default]
    C420,
    C422,
    C444,
}

/// Sample bit depth of the raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BitDepth {
    #[default]
    B8,
    B10,
    B12,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            Self::B8 => 8,
            Self::B10 => 10,
            Self::B12 => 12,
        }
    }
}

/// Surface format requested from the allocator.
///
/// The allocator classifies each request into a 1-D buffer, a 2-D
/// surface or a command batch buffer from this format; a format it does
/// not recognize for the requested shape is a caller-contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceFormat {
    /// Linear 1-D buffer; `width` carries the byte size.
    Buffer,
    /// Command batch buffer; `width` carries the byte size.
    BatchBuffer,
    /// 4:2:0 8-bit, interleaved UV plane.
    Nv12,
    /// 4:2:0 10-bit.
    P010,
    /// 4:2:2 8-bit packed.
    Yuy2,
    /// 4:2:2 10-bit packed.
    Y210,
    /// 4:4:4 8-bit packed.
    Ayuv,
    /// 4:4:4 10-bit packed.
    Y410,
}

impl SurfaceFormat {
    /// Whether this format describes pixel data (a 2-D surface).
    pub fn is_pixel_format(self) -> bool {
        !matches!(self, Self::Buffer | Self::BatchBuffer)
    }

    /// Total bytes for a surface of this format, including chroma planes.
    pub fn surface_size(self, width: u32, height: u32) -> u64 {
        let pixels = width as u64 * height as u64;
        match self {
            // Sizes for the 1-D formats are caller-supplied, not derived.
            Self::Buffer | Self::BatchBuffer => 0,
            Self::Nv12 => pixels * 3 / 2,
            Self::P010 => pixels * 3,
            Self::Yuy2 => pixels * 2,
            Self::Y210 | Self::Ayuv => pixels * 4,
            Self::Y410 => pixels * 4,
        }
    }
}

/// Memory tiling of a 2-D surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileMode {
    #[default]
    Linear,
    TileY,
}
