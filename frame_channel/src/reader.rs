//! Consumer side of a frame channel.
//!
//! [`FrameReader`] attaches to the objects a producer created and follows the
//! consumer rules of the protocol:
//!
//! - consume one unit of the frame signal per frame (`wait_frame`)
//! - read the slot only while holding the slot lock, and hold it only for
//!   the copy (`read_latest`)
//!
//! A reader only ever sees the latest frame. If it is slow, frames published
//! in between are overwritten and their signals collapsed.

use std::time::{Duration, Instant};

use frame::slot::{FrameMeta, FrameSlot, SLOT_SIZE};
use tracing::{debug, error};

use crate::error::{ShmError, ShmResult};
use crate::names::ChannelNames;
use crate::region::SharedRegion;
use crate::semaphore::{NamedSemaphore, TryAcquire};

/// Poll period of [`FrameReader::wait_frame`].
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A frame copied out of the slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Metadata as written by the producer.
    pub meta: FrameMeta,
    /// `payload[..meta.used]`.
    pub data: Vec<u8>,
}

/// Consumer handle on a frame channel.
pub struct FrameReader {
    names: ChannelNames,
    region: SharedRegion,
    signal: NamedSemaphore,
    lock: NamedSemaphore,
}

impl FrameReader {
    /// Attach to an existing channel. Never creates or removes objects.
    pub fn attach(base: &str) -> ShmResult<Self> {
        let names = ChannelNames::new(base)?;
        let region = SharedRegion::attach(names.mem(), SLOT_SIZE)?;
        let signal = NamedSemaphore::attach(names.signal(), "signal")?;
        let lock = NamedSemaphore::attach(names.lock(), "lock")?;

        debug!(channel = %names.base(), "Attached frame reader");
        Ok(Self {
            names,
            region,
            signal,
            lock,
        })
    }

    /// Names of the channel objects.
    pub fn names(&self) -> &ChannelNames {
        &self.names
    }

    /// Wait up to `timeout` for a "frame ready" signal and consume it.
    ///
    /// Returns `false` on timeout. A timeout too large to represent as a
    /// deadline (e.g. `Duration::MAX`) waits without limit.
    pub fn wait_frame(&self, timeout: Duration) -> ShmResult<bool> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            match self.signal.try_acquire() {
                TryAcquire::Acquired => return Ok(true),
                TryAcquire::Contended => {
                    let pause = match deadline {
                        Some(deadline) => {
                            let now = Instant::now();
                            if now >= deadline {
                                return Ok(false);
                            }
                            POLL_INTERVAL.min(deadline - now)
                        }
                        None => POLL_INTERVAL,
                    };
                    std::thread::sleep(pause);
                }
                TryAcquire::Failed(errno) => {
                    return Err(ShmError::Sys {
                        op: "wait",
                        name: self.names.signal().to_string_lossy().into_owned(),
                        source: errno,
                    });
                }
            }
        }
    }

    /// Copy the current frame out of the slot under the slot lock.
    pub fn read_latest(&self) -> ShmResult<Frame> {
        let guard = self.lock_slot()?;
        let slot = guard.slot()?;
        let meta = slot.meta();
        let data = slot.data()?.to_vec();
        drop(guard);

        Ok(Frame { meta, data })
    }

    /// Take the slot lock until the returned guard drops.
    ///
    /// While the guard lives every publish is dropped, so keep it short.
    pub fn lock_slot(&self) -> ShmResult<SlotGuard<'_>> {
        self.lock.acquire()?;
        Ok(SlotGuard { reader: self })
    }

    /// Current count of the frame signal (0 or 1 under a well-behaved producer).
    pub fn pending_signals(&self) -> ShmResult<i32> {
        self.signal.value()
    }
}

/// Held slot lock; posts the lock back on drop.
pub struct SlotGuard<'a> {
    reader: &'a FrameReader,
}

impl SlotGuard<'_> {
    /// The slot, readable while this guard lives.
    pub fn slot(&self) -> ShmResult<&FrameSlot> {
        let ptr = self.reader.region.as_mut_ptr().ok_or_else(|| ShmError::NotFound {
            name: self.reader.names.mem().to_string_lossy().into_owned(),
        })?;
        // SAFETY: the mapping is SLOT_SIZE bytes, page aligned, and the lock
        // held by this guard excludes the producer.
        Ok(unsafe { &*ptr.as_ptr().cast::<FrameSlot>() })
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.reader.lock.post() {
            error!(channel = %self.reader.names.base(), error = %e, "Can't release slot lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_to_missing_channel_fails() {
        let base = format!("fc_reader_missing_{}", std::process::id());
        assert!(matches!(
            FrameReader::attach(&base),
            Err(ShmError::NotFound { .. })
        ));
    }

    #[test]
    fn wait_times_out_without_frames() {
        let base = format!("fc_reader_timeout_{}", std::process::id());
        let _channel = crate::FrameChannel::open(&base, 0o600, true).unwrap();
        let reader = FrameReader::attach(&base).unwrap();

        let started = Instant::now();
        assert!(!reader.wait_frame(Duration::from_millis(20)).unwrap());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn unbounded_wait_returns_pending_frame() {
        let base = format!("fc_reader_unbounded_{}", std::process::id());
        let mut channel = crate::FrameChannel::open(&base, 0o600, true).unwrap();
        let reader = FrameReader::attach(&base).unwrap();

        channel.publish(&[1, 2, 3], 1, 1, 3, 0.5);
        assert!(reader.wait_frame(Duration::MAX).unwrap());
        assert_eq!(reader.pending_signals().unwrap(), 0);
    }
}
