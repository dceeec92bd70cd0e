//! Error types for shared memory segments and regions.

use thiserror::Error;

use crate::RegionKind;

/// Result type for shared memory operations.
pub type Result<T> = std::result::Result<T, ShmemError>;

/// Errors raised while creating, mapping or releasing shared memory.
///
/// Every variant is fatal for session startup. Nothing in this crate
/// retries.
#[derive(Debug, Error)]
pub enum ShmemError {
    /// The segment name is empty, too long or contains forbidden characters.
    #[error("invalid segment name '{name}': {reason}")]
    InvalidName {
        /// Name as supplied by the caller
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// A segment with this name already exists, usually left behind by a
    /// session that did not shut down cleanly.
    #[error("shared segment {name} already exists (stale segment?)")]
    SegmentExists {
        /// Fully qualified segment name or path
        name: String,
    },

    /// A region was requested with zero bytes.
    #[error("region {0} requested with zero size")]
    EmptyRegion(RegionKind),

    /// The region is already mapped.
    #[error("region {0} is already created")]
    RegionInUse(RegionKind),

    /// The segment would grow past what the platform can address.
    #[error("segment size overflow while adding {requested} bytes at offset {offset}")]
    SizeOverflow {
        /// Offset the region would start at
        offset: u64,
        /// Bytes requested
        requested: u64,
    },

    /// An operating system call failed.
    #[error("{op} failed for {name}: {source}")]
    Os {
        /// Operation that failed (`shm_open`, `ftruncate`, `mmap`, ...)
        op: &'static str,
        /// Segment the operation targeted
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The requested backing is not available on this platform.
    #[error("{0} shared memory is not supported on this platform")]
    Unsupported(&'static str),
}

impl ShmemError {
    pub(crate) fn os(op: &'static str, name: &str, source: std::io::Error) -> Self {
        Self::Os {
            op,
            name: name.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ShmemError::RegionInUse(RegionKind::Screen);
        assert_eq!(err.to_string(), "region screen is already created");

        let err = ShmemError::SegmentExists {
            name: "/tickbridge_a".to_string(),
        };
        assert!(err.to_string().contains("stale segment"));
    }
}
