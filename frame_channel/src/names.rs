//! Channel identity.
//!
//! All participants derive the three object names from one base name agreed
//! on out-of-band: `<base>.mem`, `<base>.sig` and `<base>.lock`.

use std::ffi::{CStr, CString};
use std::fmt;

use frame::consts::{LOCK_SUFFIX, MEM_SUFFIX, SIGNAL_SUFFIX};
use serde::Serialize;

use crate::error::{ShmError, ShmResult};
use crate::region::SharedRegion;
use crate::semaphore::NamedSemaphore;

/// The three POSIX object names of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    base: String,
    mem: CString,
    signal: CString,
    lock: CString,
}

/// Which of a channel's objects currently exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelPresence {
    /// `<base>.mem` exists.
    pub mem: bool,
    /// `<base>.sig` exists.
    pub signal: bool,
    /// `<base>.lock` exists.
    pub lock: bool,
}

impl ChannelPresence {
    /// No object left behind.
    pub fn is_absent(&self) -> bool {
        !self.mem && !self.signal && !self.lock
    }

    /// All three objects present.
    pub fn is_complete(&self) -> bool {
        self.mem && self.signal && self.lock
    }
}

impl ChannelNames {
    /// Derive object names from a base name.
    ///
    /// The base is normalised to a single leading `/`, so `cam0` and `/cam0`
    /// name the same channel.
    pub fn new(base: &str) -> ShmResult<Self> {
        let stripped = base.trim_start_matches('/');
        if stripped.is_empty() {
            return Err(invalid(base, "name is empty"));
        }
        if stripped.contains('/') {
            return Err(invalid(base, "name must not contain '/'"));
        }

        let base_path = format!("/{stripped}");
        let make = |suffix: &str| {
            CString::new(format!("{base_path}{suffix}"))
                .map_err(|_| invalid(base, "name must not contain NUL"))
        };

        Ok(Self {
            mem: make(MEM_SUFFIX)?,
            signal: make(SIGNAL_SUFFIX)?,
            lock: make(LOCK_SUFFIX)?,
            base: base_path,
        })
    }

    /// Normalised base name, with leading `/`.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Shared memory object name.
    pub fn mem(&self) -> &CStr {
        &self.mem
    }

    /// Frame signal name.
    pub fn signal(&self) -> &CStr {
        &self.signal
    }

    /// Slot lock name.
    pub fn lock(&self) -> &CStr {
        &self.lock
    }

    /// Probe which objects exist. Never creates anything.
    pub fn presence(&self) -> ShmResult<ChannelPresence> {
        Ok(ChannelPresence {
            mem: SharedRegion::exists(&self.mem)?,
            signal: NamedSemaphore::exists(&self.signal)?,
            lock: NamedSemaphore::exists(&self.lock)?,
        })
    }

    /// Remove all three names, e.g. after a producer crashed.
    ///
    /// Every removal is attempted; names already gone are skipped. Returns
    /// how many names were actually removed, or the first failure.
    pub fn unlink_all(&self) -> ShmResult<usize> {
        let results = [
            NamedSemaphore::unlink(&self.lock),
            NamedSemaphore::unlink(&self.signal),
            SharedRegion::unlink(&self.mem),
        ];

        let mut removed = 0;
        let mut first_err = None;
        for result in results {
            match result {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(channel = %self.base, error = %e, "Can't remove channel object");
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(removed), Err)
    }
}

impl fmt::Display for ChannelNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{{mem,sig,lock}}", self.base)
    }
}

fn invalid(name: &str, reason: &'static str) -> ShmError {
    ShmError::InvalidName {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_three_names() {
        let names = ChannelNames::new("cam0").unwrap();
        assert_eq!(names.base(), "/cam0");
        assert_eq!(names.mem().to_str().unwrap(), "/cam0.mem");
        assert_eq!(names.signal().to_str().unwrap(), "/cam0.sig");
        assert_eq!(names.lock().to_str().unwrap(), "/cam0.lock");
        assert_eq!(names.to_string(), "/cam0.{mem,sig,lock}");
    }

    #[test]
    fn leading_slash_is_normalised() {
        assert_eq!(
            ChannelNames::new("cam0").unwrap(),
            ChannelNames::new("//cam0").unwrap()
        );
    }

    #[test]
    fn rejects_invalid_names() {
        for bad in ["", "/", "a/b", "nul\0byte"] {
            assert!(
                matches!(ChannelNames::new(bad), Err(ShmError::InvalidName { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn unknown_channel_is_absent() {
        let names = ChannelNames::new(&format!("fc_names_absent_{}", std::process::id())).unwrap();
        let presence = names.presence().unwrap();
        assert!(presence.is_absent());
        assert!(!presence.is_complete());
        assert_eq!(names.unlink_all().unwrap(), 0);
    }
}
