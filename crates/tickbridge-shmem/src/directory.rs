//! Region directory: the per-session table of mapped sub-buffers.
//!
//! Regions are placed one after another at [`REGION_ALIGNMENT`] boundaries.
//! A new region starts at the first aligned offset after the highest live
//! region, so releasing the last region lets the next one reuse its space.
//! The segment itself never shrinks.

use std::sync::atomic::AtomicU32;

use memmap2::MmapMut;
use tracing::{debug, info};

use crate::region::{REGION_COUNT, RegionDescriptor, RegionKind, align_offset};
use crate::segment::{SegmentLocation, SharedSegment, atomic_at_mut};
use crate::{Result, ShmemError};

/// A mapped region and the descriptor it was created with.
#[derive(Debug)]
pub struct MappedRegion {
    kind: RegionKind,
    descriptor: RegionDescriptor,
    map: MmapMut,
}

impl MappedRegion {
    /// Which slot this region occupies.
    pub const fn kind(&self) -> RegionKind {
        self.kind
    }

    /// Creation-time offset, size and writable flag.
    pub const fn descriptor(&self) -> RegionDescriptor {
        self.descriptor
    }

    /// Region bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    /// Region bytes, writable.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map
    }

    /// Atomic view of the 4 bytes at `offset` inside the region, for
    /// stores. Holds the region's exclusive borrow.
    pub fn atomic_u32_mut(&mut self, offset: usize) -> Option<&AtomicU32> {
        atomic_at_mut(&mut self.map, offset)
    }
}

/// Owner of one shared segment and every region mapped inside it.
///
/// Dropping the directory unmaps every live region once and removes the
/// segment name.
#[derive(Debug)]
pub struct RegionDirectory {
    regions: [Option<MappedRegion>; REGION_COUNT],
    // Declared after `regions` so mappings are dropped before the name is
    // unlinked.
    segment: SharedSegment,
}

impl RegionDirectory {
    /// Create a new named segment with no regions.
    pub fn create(location: &SegmentLocation, name: &str) -> Result<Self> {
        let segment = SharedSegment::create(location, name)?;
        Ok(Self {
            regions: Default::default(),
            segment,
        })
    }

    /// Fully qualified segment name.
    pub fn segment_name(&self) -> String {
        self.segment.qualified_name()
    }

    /// Map a new region at the next aligned offset.
    ///
    /// Fails if `size` is zero, if the slot is already live, or if the
    /// segment cannot be extended or mapped.
    pub fn create_region(
        &mut self,
        kind: RegionKind,
        writable: bool,
        size: u64,
    ) -> Result<RegionDescriptor> {
        if size == 0 {
            return Err(ShmemError::EmptyRegion(kind));
        }
        if self.regions[kind.index()].is_some() {
            return Err(ShmemError::RegionInUse(kind));
        }

        let offset = self.next_offset()?;
        let end = offset
            .checked_add(size)
            .ok_or(ShmemError::SizeOverflow {
                offset,
                requested: size,
            })?;
        let len = usize::try_from(size).map_err(|_| ShmemError::SizeOverflow {
            offset,
            requested: size,
        })?;

        self.segment.grow_to(end)?;
        let map = self.segment.map_mut(offset, len)?;

        let descriptor = RegionDescriptor {
            offset,
            size,
            writable,
        };
        self.regions[kind.index()] = Some(MappedRegion {
            kind,
            descriptor,
            map,
        });

        info!(
            "Created region {} at offset {:#x} ({} bytes, writable={})",
            kind, offset, size, writable
        );
        Ok(descriptor)
    }

    /// Unmap a region. Returns `false` if it was not live.
    pub fn release_region(&mut self, kind: RegionKind) -> bool {
        match self.regions[kind.index()].take() {
            Some(region) => {
                debug!(
                    "Released region {} at offset {:#x}",
                    kind, region.descriptor.offset
                );
                true
            }
            None => false,
        }
    }

    /// Unmap every live region. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        RegionKind::ALL
            .into_iter()
            .filter(|kind| self.release_region(*kind))
            .count()
    }

    /// Descriptor table indexed by [`RegionKind::index`]; dead slots are zero.
    pub fn descriptors(&self) -> [RegionDescriptor; REGION_COUNT] {
        std::array::from_fn(|i| {
            self.regions[i]
                .as_ref()
                .map(MappedRegion::descriptor)
                .unwrap_or_default()
        })
    }

    /// Descriptor of a single slot, if live.
    pub fn descriptor(&self, kind: RegionKind) -> Option<RegionDescriptor> {
        self.regions[kind.index()]
            .as_ref()
            .map(MappedRegion::descriptor)
    }

    /// Whether the slot currently holds a mapping.
    pub fn is_live(&self, kind: RegionKind) -> bool {
        self.regions[kind.index()].is_some()
    }

    /// Number of live regions.
    pub fn live_count(&self) -> usize {
        self.regions.iter().filter(|r| r.is_some()).count()
    }

    /// Current segment size in bytes.
    pub const fn total_size(&self) -> u64 {
        self.segment.len()
    }

    /// Borrow a live region.
    pub fn region(&self, kind: RegionKind) -> Option<&MappedRegion> {
        self.regions[kind.index()].as_ref()
    }

    /// Borrow a live region mutably.
    pub fn region_mut(&mut self, kind: RegionKind) -> Option<&mut MappedRegion> {
        self.regions[kind.index()].as_mut()
    }

    fn next_offset(&self) -> Result<u64> {
        let highest = self
            .regions
            .iter()
            .flatten()
            .map(|r| r.descriptor.end())
            .max()
            .unwrap_or(0);
        align_offset(highest).ok_or(ShmemError::SizeOverflow {
            offset: highest,
            requested: 0,
        })
    }
}

impl Drop for RegionDirectory {
    fn drop(&mut self) {
        let released = self.release_all();
        debug!(
            "Closing segment {} ({} regions released)",
            self.segment.qualified_name(),
            released
        );
    }
}
