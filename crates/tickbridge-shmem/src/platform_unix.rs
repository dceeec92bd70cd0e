//! Unix shared memory objects using `shm_open`.
//!
//! Objects are created with `O_CREAT | O_EXCL` so a name left behind by a
//! crashed session is reported instead of silently reused, and with owner
//! only permissions (0600).

use std::ffi::CString;
use std::fs::File;
use std::os::fd::FromRawFd;

use libc::{O_CREAT, O_EXCL, O_RDONLY, O_RDWR, S_IRUSR, S_IWUSR};
use libc::{c_uint, mode_t};
use libc::{shm_open, shm_unlink};

use crate::{Result, ShmemError};

/// Prefix applied to bare segment names.
const NAME_PREFIX: &str = "/tickbridge_";

/// POSIX object name for a validated segment name.
///
/// POSIX shm names must start with '/'.
pub fn posix_name(name: &str) -> String {
    format!("{NAME_PREFIX}{name}")
}

fn c_name(shm_name: &str) -> Result<CString> {
    CString::new(shm_name).map_err(|_| ShmemError::InvalidName {
        name: shm_name.to_string(),
        reason: "contains a NUL byte",
    })
}

/// Create a new shared memory object. Fails if the name already exists.
#[allow(unsafe_code)]
pub fn create(shm_name: &str) -> Result<File> {
    let c_name = c_name(shm_name)?;

    let fd = unsafe {
        shm_open(
            c_name.as_ptr(),
            O_CREAT | O_EXCL | O_RDWR,
            (S_IRUSR | S_IWUSR) as mode_t as c_uint,
        )
    };

    if fd == -1 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            return Err(ShmemError::SegmentExists {
                name: shm_name.to_string(),
            });
        }
        return Err(ShmemError::os("shm_open", shm_name, err));
    }

    // SAFETY: `fd` was just returned by shm_open and is owned by nobody else.
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Open an existing shared memory object read-only.
#[allow(unsafe_code)]
pub fn open_read_only(shm_name: &str) -> Result<File> {
    let c_name = c_name(shm_name)?;

    let fd = unsafe { shm_open(c_name.as_ptr(), O_RDONLY, 0 as mode_t as c_uint) };
    if fd == -1 {
        return Err(ShmemError::os(
            "shm_open",
            shm_name,
            std::io::Error::last_os_error(),
        ));
    }

    // SAFETY: see `create`.
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Remove the object name. Existing mappings stay valid.
#[allow(unsafe_code)]
pub fn unlink(shm_name: &str) -> Result<()> {
    let c_name = c_name(shm_name)?;
    if unsafe { shm_unlink(c_name.as_ptr()) } == -1 {
        return Err(ShmemError::os(
            "shm_unlink",
            shm_name,
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}
