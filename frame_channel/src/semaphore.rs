//! POSIX named semaphores.
//!
//! `nix` does not wrap `sem_open`, so this module owns the raw `libc` calls
//! and exposes them behind a scoped handle. The handle closes (and, for the
//! owning participant, unlinks) the semaphore when released or dropped.

use std::ffi::{CStr, CString};
use std::ptr::NonNull;

use nix::errno::Errno;
use nix::sys::stat::Mode;
use tracing::{debug, error};

use crate::error::{ShmError, ShmResult};

/// Outcome of a non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryAcquire {
    /// One unit was taken.
    Acquired,
    /// The count was zero; nothing was taken.
    Contended,
    /// The call failed for a reason other than contention.
    Failed(Errno),
}

/// Handle to a named semaphore.
pub struct NamedSemaphore {
    name: CString,
    role: &'static str,
    sem: Option<NonNull<libc::sem_t>>,
    unlink_on_release: bool,
}

// SAFETY: sem_t handles returned by sem_open are process-wide and the
// sem_* calls are thread-safe.
unsafe impl Send for NamedSemaphore {}

impl NamedSemaphore {
    /// Create the semaphore with `initial` count, or attach if it already exists.
    ///
    /// An existing semaphore keeps its current count.
    pub fn create_or_attach(
        name: &CStr,
        role: &'static str,
        mode: Mode,
        initial: u32,
        unlink_on_release: bool,
    ) -> ShmResult<Self> {
        // SAFETY: name is NUL-terminated; O_CREAT requires the mode and value
        // variadic arguments, passed with their promoted C types.
        let sem = unsafe {
            libc::sem_open(
                name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT,
                mode.bits() as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        Self::from_raw(name, role, sem, unlink_on_release)
    }

    /// Attach to an existing semaphore without creating it.
    pub fn attach(name: &CStr, role: &'static str) -> ShmResult<Self> {
        // SAFETY: name is NUL-terminated; no O_CREAT, so no variadic arguments.
        let sem = unsafe { libc::sem_open(name.as_ptr(), 0) };
        Self::from_raw(name, role, sem, false)
    }

    fn from_raw(
        name: &CStr,
        role: &'static str,
        sem: *mut libc::sem_t,
        unlink_on_release: bool,
    ) -> ShmResult<Self> {
        if sem == libc::SEM_FAILED {
            let errno = Errno::last();
            error!(
                name = %name.to_string_lossy(),
                error = %errno,
                "Can't open frame channel {role} semaphore"
            );
            return Err(ShmError::from_errno("open semaphore", &name.to_string_lossy(), errno));
        }

        debug!(name = %name.to_string_lossy(), role, "Opened semaphore");
        Ok(Self {
            name: name.to_owned(),
            role,
            sem: NonNull::new(sem),
            unlink_on_release,
        })
    }

    /// Semaphore name, including the leading `/`.
    pub fn name(&self) -> &CStr {
        &self.name
    }

    /// Try to take one unit without waiting.
    ///
    /// `EINTR` is retried; `EAGAIN` means [`TryAcquire::Contended`].
    pub fn try_acquire(&self) -> TryAcquire {
        let Some(sem) = self.sem else {
            return TryAcquire::Failed(Errno::EBADF);
        };
        loop {
            // SAFETY: sem came from a successful sem_open and is not closed yet.
            if unsafe { libc::sem_trywait(sem.as_ptr()) } == 0 {
                return TryAcquire::Acquired;
            }
            match Errno::last() {
                Errno::EINTR => continue,
                Errno::EAGAIN => return TryAcquire::Contended,
                errno => return TryAcquire::Failed(errno),
            }
        }
    }

    /// Take one unit, blocking until available.
    pub fn acquire(&self) -> ShmResult<()> {
        let sem = self.handle("wait")?;
        loop {
            // SAFETY: see try_acquire.
            if unsafe { libc::sem_wait(sem.as_ptr()) } == 0 {
                return Ok(());
            }
            match Errno::last() {
                Errno::EINTR => continue,
                errno => return Err(self.sys_error("wait", errno)),
            }
        }
    }

    /// Give back one unit.
    pub fn post(&self) -> ShmResult<()> {
        let sem = self.handle("post")?;
        // SAFETY: see try_acquire.
        if unsafe { libc::sem_post(sem.as_ptr()) } < 0 {
            return Err(self.sys_error("post", Errno::last()));
        }
        Ok(())
    }

    /// Current count.
    pub fn value(&self) -> ShmResult<i32> {
        let sem = self.handle("read")?;
        let mut value: libc::c_int = 0;
        // SAFETY: see try_acquire; value is a valid out pointer.
        if unsafe { libc::sem_getvalue(sem.as_ptr(), &mut value) } < 0 {
            return Err(self.sys_error("read", Errno::last()));
        }
        Ok(value)
    }

    /// Close the handle and, if this participant owns the name, unlink it.
    ///
    /// Idempotent. Both steps are attempted; each failure is logged and the
    /// first one is returned. A name that is already gone is not an error.
    pub fn release(&mut self) -> ShmResult<()> {
        let Some(sem) = self.sem.take() else {
            return Ok(());
        };
        let mut first_err = None;

        // SAFETY: sem came from sem_open and is closed exactly once.
        if unsafe { libc::sem_close(sem.as_ptr()) } < 0 {
            let errno = Errno::last();
            error!(name = %self.label(), error = %errno, "Can't close frame channel {} semaphore", self.role);
            first_err.get_or_insert(self.sys_error("close", errno));
        }

        if self.unlink_on_release {
            match Self::unlink(&self.name) {
                Ok(_) => {}
                Err(e) => {
                    error!(name = %self.label(), error = %e, "Can't remove frame channel {} semaphore", self.role);
                    first_err.get_or_insert(e);
                }
            }
        }

        debug!(name = %self.label(), role = self.role, "Released semaphore");
        first_err.map_or(Ok(()), Err)
    }

    /// Check whether a semaphore with this name exists, without creating it.
    pub fn exists(name: &CStr) -> ShmResult<bool> {
        // SAFETY: name is NUL-terminated; no O_CREAT.
        let sem = unsafe { libc::sem_open(name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return match Errno::last() {
                Errno::ENOENT | Errno::ENAMETOOLONG => Ok(false),
                Errno::EACCES => Ok(true),
                errno => Err(ShmError::from_errno(
                    "probe semaphore",
                    &name.to_string_lossy(),
                    errno,
                )),
            };
        }
        // SAFETY: sem was just opened.
        unsafe { libc::sem_close(sem) };
        Ok(true)
    }

    /// Remove a semaphore name. Returns `false` if it was already absent.
    pub fn unlink(name: &CStr) -> ShmResult<bool> {
        // SAFETY: name is NUL-terminated.
        if unsafe { libc::sem_unlink(name.as_ptr()) } < 0 {
            return match Errno::last() {
                Errno::ENOENT => Ok(false),
                errno => Err(ShmError::from_errno(
                    "remove semaphore",
                    &name.to_string_lossy(),
                    errno,
                )),
            };
        }
        Ok(true)
    }

    fn handle(&self, op: &'static str) -> ShmResult<NonNull<libc::sem_t>> {
        self.sem.ok_or_else(|| self.sys_error(op, Errno::EBADF))
    }

    fn sys_error(&self, op: &'static str, errno: Errno) -> ShmError {
        ShmError::Sys {
            op,
            name: self.label(),
            source: errno,
        }
    }

    fn label(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // Failures are already logged by release().
        let _ = self.release();
    }
}
