//! Surface dimension helpers for the CSC and reconstruction families.
//!
//! Downscaled HME surface dimensions live on [`SequenceParams`] itself;
//! this module covers the remaining families.

use enchal_core::{geom, ScaledDims, SequenceParams};

/// Dimensions of the color-converted raw copy: the macroblock-aligned
/// raw frame.
pub fn csc_dims(seq: &SequenceParams) -> ScaledDims {
    ScaledDims {
        width: seq.aligned_width(),
        height: seq.aligned_height(),
    }
}

/// Dimensions of one reconstruction-pyramid level (factor 4 or 8),
/// 8-pixel aligned for the VDEnc reference fetch.
pub fn recon_dims(seq: &SequenceParams, factor: u32) -> ScaledDims {
    debug_assert!(factor == 4 || factor == 8);
    ScaledDims {
        width: geom::align_up(seq.aligned_width() / factor, 8),
        height: geom::align_up(seq.aligned_height() / factor, 8),
    }
}
