//! Sequence-level sizing parameters.
//!
//! Everything here exists to compute allocation sizes, never resource
//! identity. Downscaled dimensions are macroblock-aligned so the motion
//! estimation walkers see whole blocks, and they never drop below
//! [`geom::MIN_SCALED_DIMENSION`].

use crate::format::{BitDepth, ChromaFormat, CodecStandard, SurfaceFormat};
use crate::geom;
use serde::{Deserialize, Serialize};

/// Width/height of one downscaled surface, macroblock-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledDims {
    pub width: u32,
    pub height: u32,
}

/// Sequence-level parameters supplied by the owning encoder pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceParams {
    pub codec: CodecStandard,
    pub frame_width: u32,
    pub frame_height: u32,
    pub chroma_format: ChromaFormat,
    pub bit_depth: BitDepth,
    /// HME scaling (4x, and 16x/32x on top of it) in use.
    pub scaling_enabled: bool,
    pub scaling_16x_enabled: bool,
    pub scaling_32x_enabled: bool,
    /// 2x scaling for the VDEnc path.
    pub scaling_2x_enabled: bool,
    pub vdenc_enabled: bool,
    /// The raw input surface itself may end up in a reference list, so
    /// its CSC copy must live as long as the reference does.
    pub use_raw_for_ref: bool,
    /// Every frame in the GOP is an instantaneous refresh point.
    pub gop_is_idr_only: bool,
}

impl SequenceParams {
    /// Frame width rounded up to whole macroblocks.
    pub fn aligned_width(&self) -> u32 {
        geom::width_in_mbs(self.frame_width) * geom::MB_WIDTH
    }

    /// Frame height rounded up to whole macroblocks.
    pub fn aligned_height(&self) -> u32 {
        geom::height_in_mbs(self.frame_height) * geom::MB_HEIGHT
    }

    /// Downscaled dimensions for a given scale factor (2, 4, 16 or 32),
    /// macroblock-aligned and clamped to the minimum scaled edge.
    pub fn scaled_dims(&self, factor: u32) -> ScaledDims {
        let w = geom::width_in_mbs(self.aligned_width() / factor) * geom::MB_WIDTH;
        let h = geom::height_in_mbs(self.aligned_height() / factor) * geom::MB_HEIGHT;
        ScaledDims {
            width: w.max(geom::MIN_SCALED_DIMENSION),
            height: h.max(geom::MIN_SCALED_DIMENSION),
        }
    }

    /// Number of macroblocks in the full-resolution frame.
    pub fn num_mbs(&self) -> u32 {
        geom::width_in_mbs(self.frame_width) * geom::height_in_mbs(self.frame_height)
    }

    /// PAK object (MB code) buffer size: 16 dwords per macroblock,
    /// page-aligned.
    pub fn mb_code_size(&self) -> u64 {
        geom::align_up(self.num_mbs() * 16 * 4, geom::PAGE_SIZE) as u64
    }

    /// Motion vector data buffer size: 32 dwords per macroblock,
    /// page-aligned.
    pub fn mv_data_size(&self) -> u64 {
        geom::align_up(self.num_mbs() * 32 * 4, geom::PAGE_SIZE) as u64
    }

    /// Surface format of the color-converted copy, selected from chroma
    /// format and bit depth.
    pub fn csc_format(&self) -> SurfaceFormat {
        use BitDepth::*;
        use ChromaFormat::*;
        match (self.chroma_format, self.bit_depth) {
            (Monochrome | C420, B8) => SurfaceFormat::Nv12,
            (Monochrome | C420, _) => SurfaceFormat::P010,
            (C422, B8) => SurfaceFormat::Yuy2,
            (C422, _) => SurfaceFormat::Y210,
            (C444, B8) => SurfaceFormat::Ayuv,
            (C444, _) => SurfaceFormat::Y410,
        }
    }
}
