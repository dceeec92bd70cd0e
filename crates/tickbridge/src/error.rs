//! Error types for sessions, readers and configuration.

use thiserror::Error;
use tickbridge_shmem::{RegionKind, ShmemError};

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by [`Session`](crate::Session),
/// [`SnapshotReader`](crate::SnapshotReader) and configuration loading.
///
/// Per-tick writing never produces these; only startup, readers and
/// config loading do.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Segment or region creation failed.
    #[error(transparent)]
    Shmem(#[from] ShmemError),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration or class table JSON could not be parsed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding or decoding failed.
    #[error("snapshot codec error: {0}")]
    Encode(#[from] binrw::Error),

    /// A region is smaller than what has to be read from or written to it.
    #[error("region {kind} holds {actual} bytes, need {required}")]
    RegionTooSmall {
        /// Region that was too small
        kind: RegionKind,
        /// Bytes required
        required: u64,
        /// Bytes available
        actual: u64,
    },

    /// The segment was written by an incompatible protocol version.
    #[error("incompatible snapshot version {found} (expected {expected})")]
    IncompatibleVersion {
        /// Version this build understands
        expected: u32,
        /// Version found in the segment
        found: u32,
    },

    /// The writer kept publishing while the reader copied.
    #[error("snapshot changed during {attempts} read attempts")]
    TornRead {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// A class table entry names a class that was never declared.
    #[error("unknown class '{0}'")]
    UnknownClass(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shmem_error_is_transparent() {
        let err: SessionError = ShmemError::RegionInUse(RegionKind::Input).into();
        assert_eq!(err.to_string(), "region input is already created");
    }

    #[test]
    fn test_version_message() {
        let err = SessionError::IncompatibleVersion {
            expected: 1,
            found: 7,
        };
        assert_eq!(
            err.to_string(),
            "incompatible snapshot version 7 (expected 1)"
        );
    }
}
