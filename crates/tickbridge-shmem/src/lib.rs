//! Named shared memory segments for tickbridge.
//!
//! A session owns one named segment. The segment is split into regions
//! (game state, input, screen, depth, labels, automap, audio), each mapped
//! separately at a page-aligned offset. The [`RegionDirectory`] records
//! offset, size and reader-writable flag for every region so the table can
//! be published inside the game state snapshot, letting an external reader
//! locate every sub-buffer from the segment name alone.
//!
//! # Backing
//!
//! - [`SegmentLocation::Posix`]: `shm_open` objects (Unix only)
//! - [`SegmentLocation::Directory`]: a plain file inside a directory,
//!   mapped with `MAP_SHARED` (any tmpfs such as `/dev/shm` behaves the
//!   same as a POSIX object)
//!
//! # Example
//!
//! ```rust,ignore
//! use tickbridge_shmem::{RegionDirectory, RegionKind, SegmentLocation};
//!
//! let mut dir = RegionDirectory::create(&SegmentLocation::Posix, "doom_0")?;
//! let desc = dir.create_region(RegionKind::GameState, false, 4096)?;
//! assert_eq!(desc.offset, 0);
//! # Ok::<(), tickbridge_shmem::ShmemError>(())
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

mod directory;
mod error;
mod region;
mod segment;

#[cfg(unix)]
mod platform_unix;

pub use directory::{MappedRegion, RegionDirectory};
pub use error::{Result, ShmemError};
pub use region::{REGION_ALIGNMENT, REGION_COUNT, RegionDescriptor, RegionKind, align_offset};
pub use segment::{MAX_NAME_LEN, SegmentLocation, SegmentView, SharedSegment, validate_name};
