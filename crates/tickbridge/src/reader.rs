//! Consistent reader for a published snapshot.

use std::sync::atomic::{AtomicU32, Ordering, fence};

use tickbridge_shmem::{RegionKind, SegmentLocation, SegmentView};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::layout::{
    GENERATION_OFFSET, HEADER_SIZE, PROTOCOL_VERSION, SNAPSHOT_SIZE, SnapshotBody, SnapshotHeader,
};

/// A snapshot copied out under a stable generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSnapshot {
    /// Header, with the generation the copy was taken at
    pub header: SnapshotHeader,
    /// Decoded body
    pub body: SnapshotBody,
}

/// Read-only attachment to a session's segment.
///
/// The mapping covers the segment as it was when attached. Regions created
/// afterwards need a fresh attachment.
#[derive(Debug)]
pub struct SnapshotReader {
    view: SegmentView,
    attempts: u32,
}

impl SnapshotReader {
    /// Attach to the segment `name` and check its protocol version.
    pub fn attach(location: &SegmentLocation, name: &str, attempts: u32) -> Result<Self> {
        let view = SegmentView::open(location, name)?;

        if view.len() < SNAPSHOT_SIZE {
            return Err(SessionError::RegionTooSmall {
                kind: RegionKind::GameState,
                required: SNAPSHOT_SIZE as u64,
                actual: view.len() as u64,
            });
        }

        let header = SnapshotHeader::from_mapped(view.as_slice()).ok_or(
            SessionError::RegionTooSmall {
                kind: RegionKind::GameState,
                required: HEADER_SIZE as u64,
                actual: view.len() as u64,
            },
        )?;
        if header.version != PROTOCOL_VERSION {
            return Err(SessionError::IncompatibleVersion {
                expected: PROTOCOL_VERSION,
                found: header.version,
            });
        }

        debug!(
            "Attached reader to {} (version {} '{}')",
            view.name(),
            header.version,
            header.version_string()
        );
        Ok(Self {
            view,
            attempts: attempts.max(1),
        })
    }

    /// Attach using a session configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Self::attach(
            &config.segment.location,
            &config.segment.name,
            config.read_attempts,
        )
    }

    fn generation_word(&self) -> Result<&AtomicU32> {
        self.view
            .atomic_u32(GENERATION_OFFSET)
            .ok_or(SessionError::RegionTooSmall {
                kind: RegionKind::GameState,
                required: HEADER_SIZE as u64,
                actual: self.view.len() as u64,
            })
    }

    /// Current generation without copying the snapshot.
    pub fn generation(&self) -> Result<u32> {
        Ok(self.generation_word()?.load(Ordering::Acquire))
    }

    /// Copy and decode the snapshot.
    ///
    /// Retries while a write is in progress or the generation moves during
    /// the copy. Gives up with [`SessionError::TornRead`] after the
    /// configured number of attempts.
    pub fn read(&self) -> Result<PublishedSnapshot> {
        let generation = self.generation_word()?;
        let mut buf = vec![0u8; SNAPSHOT_SIZE];

        for _ in 0..self.attempts {
            let before = generation.load(Ordering::Acquire);
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }

            buf.copy_from_slice(&self.view.as_slice()[..SNAPSHOT_SIZE]);
            fence(Ordering::Acquire);

            if generation.load(Ordering::Relaxed) != before {
                std::hint::spin_loop();
                continue;
            }

            let mut header = SnapshotHeader::from_mapped(&buf).ok_or(SessionError::RegionTooSmall {
                kind: RegionKind::GameState,
                required: HEADER_SIZE as u64,
                actual: buf.len() as u64,
            })?;
            header.generation = before;
            let body = SnapshotBody::decode(&buf[HEADER_SIZE..])?;
            return Ok(PublishedSnapshot { header, body });
        }

        warn!("Gave up reading snapshot after {} attempts", self.attempts);
        Err(SessionError::TornRead {
            attempts: self.attempts,
        })
    }

    /// Bytes of a region, located through the table in `snapshot`.
    ///
    /// `None` if the region is not live or lies past the attached mapping.
    pub fn region_bytes(&self, snapshot: &PublishedSnapshot, kind: RegionKind) -> Option<&[u8]> {
        let entry = snapshot.body.geometry.regions.get(kind.index())?;
        if entry.size == 0 {
            return None;
        }
        let start = usize::try_from(entry.offset).ok()?;
        let end = start.checked_add(usize::try_from(entry.size).ok()?)?;
        self.view.as_slice().get(start..end)
    }

    /// Name of the attached segment.
    pub fn segment_name(&self) -> &str {
        self.view.name()
    }
}
