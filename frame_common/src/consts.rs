//! Frame channel constants.
//!
//! Single source of truth for the payload capacity and the resource naming
//! scheme. Producer and consumers must be built against the same values.

/// Payload capacity of the frame slot in bytes (32 MiB).
///
/// Large enough for an uncompressed 4K YUYV frame with headroom.
pub const MAX_DATA: usize = 33_554_432;

/// Suffix of the shared memory object holding the frame slot.
pub const MEM_SUFFIX: &str = ".mem";

/// Suffix of the "frame ready" counting semaphore.
pub const SIGNAL_SUFFIX: &str = ".sig";

/// Suffix of the binary semaphore guarding the slot.
pub const LOCK_SUFFIX: &str = ".lock";

/// Default permission bits for the three named objects.
pub const DEFAULT_MODE: u32 = 0o660;

/// Initial value of the slot lock (available).
pub const LOCK_INITIAL: u32 = 1;

/// Initial value of the frame signal (no frame pending).
pub const SIGNAL_INITIAL: u32 = 0;

/// Default configuration file used by the probe binary.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/frame_channel/probe.toml";
