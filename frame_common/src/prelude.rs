//! Common re-exports for frame channel crates.
//!
//! ```rust
//! use frame_common::prelude::*;
//! ```

pub use crate::clock::{monotonic_secs, try_monotonic_secs};
pub use crate::config::{ChannelConfig, ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::consts::{
    DEFAULT_MODE, LOCK_INITIAL, LOCK_SUFFIX, MAX_DATA, MEM_SUFFIX, SIGNAL_INITIAL, SIGNAL_SUFFIX,
};
pub use crate::slot::{FrameMeta, FrameSlot, SLOT_SIZE, SlotError};
