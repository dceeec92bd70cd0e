//! Shared segment lifecycle: create, grow, map, unlink.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::atomic::AtomicU32;

use memmap2::{Mmap, MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Result, ShmemError};

/// Maximum segment name length in bytes (POSIX allows 255 with the prefix).
pub const MAX_NAME_LEN: usize = 200;

/// Where a segment lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentLocation {
    /// POSIX shared memory object (`shm_open`)
    #[default]
    Posix,
    /// Regular file inside the given directory
    Directory(PathBuf),
}

/// Check that a segment name is usable for both backings.
///
/// Allowed: ASCII alphanumerics, `_`, `-` and `.`, at most
/// [`MAX_NAME_LEN`] bytes, not `.` or `..`.
pub fn validate_name(name: &str) -> Result<()> {
    let reject = |reason| {
        Err(ShmemError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("empty");
    }
    if name.len() > MAX_NAME_LEN {
        return reject("longer than 200 bytes");
    }
    if name == "." || name == ".." {
        return reject("reserved path component");
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    {
        return reject("only ASCII letters, digits, '_', '-' and '.' are allowed");
    }
    Ok(())
}

#[derive(Debug)]
enum Backing {
    #[cfg(unix)]
    Posix(String),
    File(PathBuf),
}

impl Backing {
    fn display(&self) -> String {
        match self {
            #[cfg(unix)]
            Self::Posix(name) => name.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

fn open_backing(location: &SegmentLocation, name: &str, create: bool) -> Result<(File, Backing)> {
    validate_name(name)?;

    match location {
        #[cfg(unix)]
        SegmentLocation::Posix => {
            let shm_name = crate::platform_unix::posix_name(name);
            let file = if create {
                crate::platform_unix::create(&shm_name)?
            } else {
                crate::platform_unix::open_read_only(&shm_name)?
            };
            Ok((file, Backing::Posix(shm_name)))
        }
        #[cfg(not(unix))]
        SegmentLocation::Posix => Err(ShmemError::Unsupported("POSIX")),
        SegmentLocation::Directory(dir) => {
            let path = dir.join(name);
            let qualified = path.display().to_string();
            let file = if create {
                if !dir.exists() {
                    info!("Creating segment directory: {}", dir.display());
                    std::fs::create_dir_all(dir)
                        .map_err(|e| ShmemError::os("create_dir_all", &qualified, e))?;
                }
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .map_err(|e| {
                        if e.kind() == std::io::ErrorKind::AlreadyExists {
                            ShmemError::SegmentExists {
                                name: qualified.clone(),
                            }
                        } else {
                            ShmemError::os("open", &qualified, e)
                        }
                    })?
            } else {
                OpenOptions::new()
                    .read(true)
                    .open(&path)
                    .map_err(|e| ShmemError::os("open", &qualified, e))?
            };
            Ok((file, Backing::File(path)))
        }
    }
}

/// A named segment owned by the writing session.
///
/// Dropping the segment removes its name. Mappings created from it stay
/// valid until they are dropped themselves.
#[derive(Debug)]
pub struct SharedSegment {
    file: File,
    backing: Backing,
    len: u64,
}

impl SharedSegment {
    /// Create a new, empty segment.
    ///
    /// Fails with [`ShmemError::SegmentExists`] if the name is taken.
    pub fn create(location: &SegmentLocation, name: &str) -> Result<Self> {
        let (file, backing) = open_backing(location, name, true)?;
        info!("Created shared segment {}", backing.display());
        Ok(Self {
            file,
            backing,
            len: 0,
        })
    }

    /// Current segment size in bytes.
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// True if nothing has been allocated yet.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fully qualified name (POSIX object name or file path).
    pub fn qualified_name(&self) -> String {
        self.backing.display()
    }

    /// Grow the segment to `len` bytes. Never shrinks.
    pub fn grow_to(&mut self, len: u64) -> Result<()> {
        if len <= self.len {
            return Ok(());
        }
        self.file
            .set_len(len)
            .map_err(|e| ShmemError::os("ftruncate", &self.backing.display(), e))?;
        debug!(
            "Grew segment {} from {} to {} bytes",
            self.backing.display(),
            self.len,
            len
        );
        self.len = len;
        Ok(())
    }

    /// Map `len` bytes at `offset` read-write.
    #[allow(unsafe_code)]
    pub fn map_mut(&self, offset: u64, len: usize) -> Result<MmapMut> {
        // SAFETY: the segment is created exclusively by this process and the
        // mapped range lies inside the current file length. Concurrent
        // readers in other processes are coordinated by the snapshot
        // generation counter.
        unsafe { MmapOptions::new().offset(offset).len(len).map_mut(&self.file) }
            .map_err(|e| ShmemError::os("mmap", &self.backing.display(), e))
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        let result = match &self.backing {
            #[cfg(unix)]
            Backing::Posix(name) => crate::platform_unix::unlink(name),
            Backing::File(path) => std::fs::remove_file(path)
                .map_err(|e| ShmemError::os("remove_file", &path.display().to_string(), e)),
        };
        match result {
            Ok(()) => debug!("Removed shared segment {}", self.backing.display()),
            Err(e) => warn!("Failed to remove shared segment: {e}"),
        }
    }
}

/// Read-only view of a whole segment, used by external readers.
#[derive(Debug)]
pub struct SegmentView {
    map: Mmap,
    name: String,
}

impl SegmentView {
    /// Attach to an existing segment and map its current length.
    #[allow(unsafe_code)]
    pub fn open(location: &SegmentLocation, name: &str) -> Result<Self> {
        let (file, backing) = open_backing(location, name, false)?;
        let qualified = backing.display();
        let len = file
            .metadata()
            .map_err(|e| ShmemError::os("fstat", &qualified, e))?
            .len();

        // SAFETY: read-only mapping; the writer only mutates the contents,
        // never truncates below the length observed here while the session
        // is alive.
        let map = unsafe { MmapOptions::new().len(len as usize).map(&file) }
            .map_err(|e| ShmemError::os("mmap", &qualified, e))?;

        debug!("Attached to segment {qualified} ({len} bytes)");
        Ok(Self { map, name: qualified })
    }

    /// Mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    /// Mapped length.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if the segment had no bytes when attached.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Qualified name of the attached segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Atomic view of the 4 bytes at `offset`, for loads only.
    ///
    /// Returns `None` if the range is out of bounds or misaligned.
    pub fn atomic_u32(&self, offset: usize) -> Option<&AtomicU32> {
        atomic_at(&self.map, offset)
    }
}

/// Load-only atomic view of 4 bytes inside a read-only mapping.
///
/// Callers must only `load` through the returned reference.
#[allow(unsafe_code)]
pub(crate) fn atomic_at(bytes: &[u8], offset: usize) -> Option<&AtomicU32> {
    let end = offset.checked_add(size_of::<AtomicU32>())?;
    if end > bytes.len() {
        return None;
    }
    let ptr = bytes[offset..].as_ptr();
    if ptr.align_offset(align_of::<AtomicU32>()) != 0 {
        return None;
    }
    // SAFETY: bounds and alignment checked above. This process never writes
    // through the reference; the word is mutated only by the writing process
    // through its own mutable mapping.
    Some(unsafe { &*ptr.cast::<AtomicU32>() })
}

/// Atomic view of 4 bytes inside a writable mapping.
///
/// The pointer is derived from the exclusive borrow, so stores through the
/// returned reference are allowed for as long as `bytes` stays borrowed.
#[allow(unsafe_code)]
pub(crate) fn atomic_at_mut(bytes: &mut [u8], offset: usize) -> Option<&AtomicU32> {
    let end = offset.checked_add(size_of::<AtomicU32>())?;
    let word = bytes.get_mut(offset..end)?;
    let ptr = word.as_mut_ptr();
    if ptr.align_offset(align_of::<AtomicU32>()) != 0 {
        return None;
    }
    // SAFETY: in bounds and aligned; `ptr` carries write permission from the
    // `&mut [u8]` borrow, which outlives the returned reference.
    Some(unsafe { &*ptr.cast::<AtomicU32>() })
}
