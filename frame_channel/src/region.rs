//! Named POSIX shared memory region.
//!
//! Wraps `shm_open` + `mmap` behind a scoped handle. The mapping is unmapped,
//! the descriptor closed and (for the owning participant) the name unlinked
//! on [`SharedRegion::release`] or drop.

use std::ffi::{CStr, CString};
use std::fs::File;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap, shm_open, shm_unlink};
use nix::sys::stat::Mode;
use tracing::{debug, error};

use crate::error::{ShmError, ShmResult};

/// Mapped shared memory object.
pub struct SharedRegion {
    name: CString,
    file: Option<File>,
    ptr: Option<NonNull<libc::c_void>>,
    len: usize,
    unlink_on_release: bool,
}

// SAFETY: the region owns its mapping; concurrent access to the mapped bytes
// is governed by the channel's slot lock, not by this type.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Create the object (or attach if it exists), size it to exactly `len`
    /// bytes and map it read/write.
    ///
    /// A freshly created object is zero-filled by the kernel.
    pub fn create_or_attach(
        name: &CStr,
        mode: Mode,
        len: usize,
        unlink_on_release: bool,
    ) -> ShmResult<Self> {
        let fd = shm_open(name, OFlag::O_RDWR | OFlag::O_CREAT, mode).map_err(|errno| {
            error!(name = %name.to_string_lossy(), error = %errno, "Can't open frame channel memory");
            ShmError::from_errno("open memory", &name.to_string_lossy(), errno)
        })?;

        // From here on, dropping `region` runs the release path.
        let mut region = Self {
            name: name.to_owned(),
            file: Some(File::from(fd)),
            ptr: None,
            len,
            unlink_on_release,
        };

        if let Some(file) = region.file.as_ref() {
            file.set_len(len as u64).map_err(|e| {
                error!(name = %region.label(), error = %e, "Can't truncate frame channel memory");
                ShmError::Io { source: e }
            })?;
        }

        region.map()?;
        debug!(name = %region.label(), len, "Created shared memory region");
        Ok(region)
    }

    /// Attach to an existing object whose size must be exactly `len`.
    pub fn attach(name: &CStr, len: usize) -> ShmResult<Self> {
        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty())
            .map_err(|errno| ShmError::from_errno("open memory", &name.to_string_lossy(), errno))?;
        let file = File::from(fd);

        let actual = file.metadata()?.len() as usize;
        if actual != len {
            return Err(ShmError::LayoutMismatch {
                name: name.to_string_lossy().into_owned(),
                expected: len,
                actual,
            });
        }

        let mut region = Self {
            name: name.to_owned(),
            file: Some(file),
            ptr: None,
            len,
            unlink_on_release: false,
        };
        region.map()?;
        debug!(name = %region.label(), len, "Attached shared memory region");
        Ok(region)
    }

    fn map(&mut self) -> ShmResult<()> {
        let (Some(file), Some(length)) = (self.file.as_ref(), NonZeroUsize::new(self.len)) else {
            return Err(ShmError::Sys {
                op: "mmap",
                name: self.label(),
                source: Errno::EINVAL,
            });
        };

        // SAFETY: the descriptor is open read/write and sized to `len`; the
        // kernel picks the address.
        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                file,
                0,
            )
        }
        .map_err(|errno| {
            error!(name = %self.label(), error = %errno, "Can't mmap frame channel memory");
            ShmError::from_errno("mmap memory", &self.label(), errno)
        })?;

        self.ptr = Some(ptr);
        Ok(())
    }

    /// Object name, including the leading `/`.
    pub fn name(&self) -> &CStr {
        &self.name
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty (never true for a live region).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start of the mapping, or `None` once released.
    ///
    /// Callers must hold the channel's slot lock while touching the bytes.
    pub fn as_mut_ptr(&self) -> Option<NonNull<u8>> {
        self.ptr.map(NonNull::cast)
    }

    /// Unmap, close and (for the owner) unlink.
    ///
    /// Idempotent. Every step is attempted; failures are logged and the first
    /// one is returned. A name that is already gone is not an error.
    pub fn release(&mut self) -> ShmResult<()> {
        let mut first_err = None;

        if let Some(ptr) = self.ptr.take() {
            // SAFETY: ptr/len describe a mapping created by map() that is
            // unmapped exactly once.
            if let Err(errno) = unsafe { munmap(ptr, self.len) } {
                error!(name = %self.label(), error = %errno, "Can't unmap frame channel memory");
                first_err.get_or_insert(ShmError::Sys {
                    op: "unmap",
                    name: self.label(),
                    source: errno,
                });
            }
        }

        // Dropping the File closes the descriptor.
        if self.file.take().is_some() && self.unlink_on_release {
            if let Err(e) = Self::unlink(&self.name) {
                error!(name = %self.label(), error = %e, "Can't remove frame channel memory");
                first_err.get_or_insert(e);
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Check whether an object with this name exists, without creating it.
    pub fn exists(name: &CStr) -> ShmResult<bool> {
        match shm_open(name, OFlag::O_RDONLY, Mode::empty()) {
            Ok(_fd) => Ok(true),
            Err(Errno::ENOENT | Errno::ENAMETOOLONG) => Ok(false),
            Err(Errno::EACCES) => Ok(true),
            Err(errno) => Err(ShmError::from_errno(
                "probe memory",
                &name.to_string_lossy(),
                errno,
            )),
        }
    }

    /// Remove an object name. Returns `false` if it was already absent.
    pub fn unlink(name: &CStr) -> ShmResult<bool> {
        match shm_unlink(name) {
            Ok(()) => Ok(true),
            Err(Errno::ENOENT) => Ok(false),
            Err(errno) => Err(ShmError::from_errno(
                "remove memory",
                &name.to_string_lossy(),
                errno,
            )),
        }
    }

    fn label(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
