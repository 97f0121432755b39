//! # Frame Channel
//!
//! Cross-process handoff of the latest video frame through one shared memory
//! slot. A producer publishes frames without ever blocking; any number of
//! consumer processes read the newest frame when they are ready.
//!
//! ## Objects
//!
//! Every channel is three POSIX objects derived from one base name:
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────┐    ┌─────────────────┐
//! │   Producer      │    │  <base>.mem          │    │   Consumer 1    │
//! │                 │    │  [meta | payload]    │    │                 │
//! │  FrameChannel   ├───►│                      ├───►│  FrameReader    │
//! │  publish()      │    │  <base>.lock  (1)    │    │  read_latest()  │
//! └─────────────────┘    │  <base>.sig   (0..1) │    └─────────────────┘
//!                        └──────────────────────┘           ...
//! ```
//!
//! - `.mem` holds one [`FrameSlot`](frame::slot::FrameSlot)
//! - `.lock` is a binary semaphore guarding every slot access
//! - `.sig` counts unconsumed frames, never above one
//!
//! ## Drop-on-contention
//!
//! `publish` only ever *tries* the slot lock. If a consumer holds it, the
//! frame is dropped and the producer carries on. A frame published while the
//! previous one is still unread replaces it, and its signal replaces the old
//! signal, so a consumer always wakes up to exactly one, latest frame.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use frame_channel::{FrameChannel, FrameReader, ShmResult, monotonic_secs};
//! use std::time::Duration;
//!
//! # fn main() -> ShmResult<()> {
//! // Producer
//! let mut channel = FrameChannel::open("cam0", 0o660, true)?;
//! let ts = monotonic_secs();
//! channel.publish(&[1, 2, 3, 4], 1, 640, 480, ts);
//!
//! // Consumer, usually another process
//! let reader = FrameReader::attach("cam0")?;
//! if reader.wait_frame(Duration::from_millis(100))? {
//!     let latest = reader.read_latest()?;
//!     println!("{}x{}: {} bytes", latest.meta.width, latest.meta.height, latest.data.len());
//! }
//!
//! channel.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! `open`, `attach` and `close` return [`ShmResult`]. `publish` never returns
//! an error; failures are logged and observable through
//! [`FrameChannel::is_disabled`] and the returned [`PublishOutcome`].

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod error;
pub mod names;
pub mod probe;
pub mod reader;
pub mod region;
pub mod semaphore;

pub use channel::{FrameChannel, PublishOutcome, PublishStats};
pub use error::{ShmError, ShmResult};
pub use frame::clock::monotonic_secs;
pub use frame::consts::MAX_DATA;
pub use frame::slot::{FrameMeta, FrameSlot, SLOT_SIZE};
pub use names::{ChannelNames, ChannelPresence};
pub use reader::{Frame, FrameReader, SlotGuard};
pub use semaphore::{NamedSemaphore, TryAcquire};

/// Initialize tracing with an `EnvFilter` taken from `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
