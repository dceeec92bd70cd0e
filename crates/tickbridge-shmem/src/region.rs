//! Region identifiers and descriptors.

use std::fmt;

/// Number of region slots in the directory.
pub const REGION_COUNT: usize = 7;

/// Alignment of every region offset inside the segment.
///
/// Page sized so each region can be mapped on its own.
pub const REGION_ALIGNMENT: u64 = 4096;

/// Round `offset` up to the next [`REGION_ALIGNMENT`] boundary.
///
/// Returns `None` on overflow.
pub const fn align_offset(offset: u64) -> Option<u64> {
    match offset.checked_add(REGION_ALIGNMENT - 1) {
        Some(v) => Some(v & !(REGION_ALIGNMENT - 1)),
        None => None,
    }
}

/// Fixed region slots. The discriminant is the table index published in the
/// snapshot and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RegionKind {
    /// Game state snapshot, written every tick
    GameState = 0,
    /// Input buffer written by the external controller
    Input = 1,
    /// Screen pixels
    Screen = 2,
    /// Depth buffer
    Depth = 3,
    /// Label buffer
    Labels = 4,
    /// Automap buffer
    Automap = 5,
    /// Audio samples
    Audio = 6,
}

impl RegionKind {
    /// All kinds in table order.
    pub const ALL: [Self; REGION_COUNT] = [
        Self::GameState,
        Self::Input,
        Self::Screen,
        Self::Depth,
        Self::Labels,
        Self::Automap,
        Self::Audio,
    ];

    /// Table index of this region.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Region for a table index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Lowercase name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::GameState => "game_state",
            Self::Input => "input",
            Self::Screen => "screen",
            Self::Depth => "depth",
            Self::Labels => "labels",
            Self::Automap => "automap",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Offset, size and reader-writable flag of one region.
///
/// A zeroed descriptor means the slot is not in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionDescriptor {
    /// Byte offset inside the segment
    pub offset: u64,
    /// Region size in bytes
    pub size: u64,
    /// Whether the external reader may write into the region
    pub writable: bool,
}

impl RegionDescriptor {
    /// True if this descriptor points at a mapped region.
    pub const fn is_live(&self) -> bool {
        self.size > 0
    }

    /// Exclusive end offset.
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }
}
