//! Error types for frame channel operations

use nix::errno::Errno;
use thiserror::Error;

/// Errors that can occur while opening, using or closing a frame channel
#[derive(Error, Debug)]
pub enum ShmError {
    /// Channel base name cannot be turned into POSIX object names
    #[error("Invalid channel name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Named object does not exist
    #[error("Object not found: {name}")]
    NotFound {
        /// Object name
        name: String,
    },

    /// Permission denied
    #[error("Permission denied accessing object: {name}")]
    PermissionDenied {
        /// Object name
        name: String,
    },

    /// Existing memory object does not match the compiled slot layout
    #[error("Layout mismatch on {name}: expected {expected} bytes, found {actual}")]
    LayoutMismatch {
        /// Object name
        name: String,
        /// `SLOT_SIZE` of this build
        expected: usize,
        /// Size of the object found
        actual: usize,
    },

    /// Slot metadata is inconsistent
    #[error("Corrupt frame slot: {source}")]
    CorruptSlot {
        /// Slot accessor error
        #[from]
        source: frame::slot::SlotError,
    },

    /// System call failed
    #[error("Can't {op} {name}: {source}")]
    Sys {
        /// Operation that failed
        op: &'static str,
        /// Object name
        name: String,
        /// errno reported by the call
        source: Errno,
    },

    /// Channel configuration rejected
    #[error("Invalid channel configuration: {source}")]
    Config {
        /// Source configuration error
        #[from]
        source: frame::config::ConfigError,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

impl ShmError {
    /// Classify a failed system call on a named object.
    ///
    /// `ENOENT` and `EACCES` get their own variants so callers can tell a
    /// missing producer from a misconfigured one.
    pub fn from_errno(op: &'static str, name: &str, errno: Errno) -> Self {
        match errno {
            Errno::ENOENT => Self::NotFound {
                name: name.to_string(),
            },
            Errno::EACCES | Errno::EPERM => Self::PermissionDenied {
                name: name.to_string(),
            },
            source => Self::Sys {
                op,
                name: name.to_string(),
                source,
            },
        }
    }
}

/// Result type for frame channel operations
pub type ShmResult<T> = Result<T, ShmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_classification() {
        assert!(matches!(
            ShmError::from_errno("open", "/cam0.mem", Errno::ENOENT),
            ShmError::NotFound { .. }
        ));
        assert!(matches!(
            ShmError::from_errno("open", "/cam0.mem", Errno::EACCES),
            ShmError::PermissionDenied { .. }
        ));
        let err = ShmError::from_errno("post", "/cam0.sig", Errno::EOVERFLOW);
        assert!(matches!(
            err,
            ShmError::Sys {
                op: "post",
                source: Errno::EOVERFLOW,
                ..
            }
        ));
        assert!(err.to_string().contains("/cam0.sig"));
    }
}
