//! Compact resource tags.
//!
//! A tag packs (sub-index, resource kind, owning codec, dimensionality
//! class) into 16 bits. The packed form is only a storage key; all
//! identity comparison happens on the decoded fields.
//!
//! The sub-index is meaningful only for kinds in the *tracked* or
//! *recycled* numeric ranges. For every other kind the index is forced
//! to zero at construction, so singleton per-codec resources collide
//! predictably to one tag no matter what index a caller passes.

use enchal_core::{CodecStandard, EnchalError, Result};
use serde::{Deserialize, Serialize};

// Bit layout, LSB first: index(5) | kind(6) | codec(3) | class(2).
const INDEX_BITS: u16 = 5;
const KIND_BITS: u16 = 6;
const CODEC_BITS: u16 = 3;
const INDEX_MASK: u16 = (1 << INDEX_BITS) - 1;
const KIND_MASK: u16 = (1 << KIND_BITS) - 1;
const CODEC_MASK: u16 = (1 << CODEC_BITS) - 1;
const KIND_SHIFT: u16 = INDEX_BITS;
const CODEC_SHIFT: u16 = INDEX_BITS + KIND_BITS;
const CLASS_SHIFT: u16 = INDEX_BITS + KIND_BITS + CODEC_BITS;

/// Largest sub-index a tag can carry.
pub const MAX_TAG_INDEX: u8 = (1 << INDEX_BITS) - 1;

/// Resource kind. Discriminants are the 6-bit tag field values.
///
/// Kinds 1..=10 form the tracked range (reuse tied to reference-picture
/// activity) and 16..=18 the recycled range (short fixed-size ring);
/// only those two ranges carry a meaningful sub-index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ResourceKind {
    // Tracked family: 1..=10
    MbCode = 1,
    MvData = 2,
    MvTemporal = 3,
    CscSurface = 4,
    Ds4x = 5,
    Ds2x = 6,
    Ds16x = 7,
    Ds32x = 8,
    Ds4xRecon = 9,
    Ds8xRecon = 10,

    // Recycled family: 16..=18
    BrcHistory = 16,
    PakStats = 17,
    StreamIn = 18,

    // Singletons: one instance per codec, index always zero
    SeqParamset = 24,
    PicParamset = 25,
}

const TRACKED_RANGE: std::ops::RangeInclusive<u16> = 1..=10;
const RECYCLED_RANGE: std::ops::RangeInclusive<u16> = 16..=18;

impl ResourceKind {
    const fn to_bits(self) -> u16 {
        self as u16
    }

    fn from_bits(bits: u16) -> Option<Self> {
        use ResourceKind::*;
        Some(match bits {
            1 => MbCode,
            2 => MvData,
            3 => MvTemporal,
            4 => CscSurface,
            5 => Ds4x,
            6 => Ds2x,
            7 => Ds16x,
            8 => Ds32x,
            9 => Ds4xRecon,
            10 => Ds8xRecon,
            16 => BrcHistory,
            17 => PakStats,
            18 => StreamIn,
            24 => SeqParamset,
            25 => PicParamset,
            _ => return None,
        })
    }

    /// Reuse of this kind is tied to reference-picture activity.
    pub fn is_tracked(self) -> bool {
        TRACKED_RANGE.contains(&self.to_bits())
    }

    /// Reused via a short fixed-size rotation.
    pub fn is_recycled(self) -> bool {
        RECYCLED_RANGE.contains(&self.to_bits())
    }

    /// Dimensionality class, fixed per kind so lookup stays pure on
    /// (codec, kind, index).
    pub fn class(self) -> ResourceClass {
        use ResourceKind::*;
        match self {
            MbCode | MvData | MvTemporal | BrcHistory | PakStats | SeqParamset | PicParamset => {
                ResourceClass::Buffer1D
            }
            CscSurface | Ds4x | Ds2x | Ds16x | Ds32x | Ds4xRecon | Ds8xRecon => {
                ResourceClass::Surface2D
            }
            StreamIn => ResourceClass::Batch,
        }
    }
}

/// Dimensionality class of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ResourceClass {
    Buffer1D = 0,
    Surface2D = 1,
    Batch = 2,
}

impl ResourceClass {
    fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0 => Some(Self::Buffer1D),
            1 => Some(Self::Surface2D),
            2 => Some(Self::Batch),
            _ => None,
        }
    }
}

/// Decoded resource identity: the sole lookup key of the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceTag {
    codec: CodecStandard,
    kind: ResourceKind,
    index: u8,
}

impl ResourceTag {
    /// Build a tag. For kinds outside the tracked and recycled ranges
    /// the index collapses to zero.
    pub fn new(codec: CodecStandard, kind: ResourceKind, index: u8) -> Self {
        let index = if kind.is_tracked() || kind.is_recycled() {
            index & MAX_TAG_INDEX as u8
        } else {
            0
        };
        Self { codec, kind, index }
    }

    pub fn codec(&self) -> CodecStandard {
        self.codec
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn class(&self) -> ResourceClass {
        self.kind.class()
    }

    /// The relaxed-match tag: same codec and kind, index cleared. Used
    /// for "does any instance of this family exist" queries.
    pub fn family(&self) -> Self {
        Self {
            index: 0,
            ..*self
        }
    }

    /// Pack into the 16-bit wire form.
    pub fn encode(&self) -> u16 {
        (self.index as u16 & INDEX_MASK)
            | (self.kind.to_bits() << KIND_SHIFT)
            | (self.codec.to_bits() << CODEC_SHIFT)
            | ((self.kind.class() as u16) << CLASS_SHIFT)
    }

    /// Decode the packed form, preserving the sub-index.
    pub fn decode(raw: u16) -> Result<Self> {
        let kind = ResourceKind::from_bits((raw >> KIND_SHIFT) & KIND_MASK)
            .ok_or(EnchalError::InvalidTag(raw))?;
        let codec = CodecStandard::from_bits((raw >> CODEC_SHIFT) & CODEC_MASK)
            .ok_or(EnchalError::InvalidTag(raw))?;
        let class =
            ResourceClass::from_bits(raw >> CLASS_SHIFT).ok_or(EnchalError::InvalidTag(raw))?;
        if class != kind.class() {
            return Err(EnchalError::InvalidTag(raw));
        }
        Ok(Self::new(codec, kind, (raw & INDEX_MASK) as u8))
    }

    /// Decode with the sub-index cleared (relaxed match level).
    pub fn decode_family(raw: u16) -> Result<Self> {
        Ok(Self::decode(raw)?.family())
    }
}
