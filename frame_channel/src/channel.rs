//! Producer side of a frame channel.
//!
//! A [`FrameChannel`] owns the three named objects of one channel and
//! publishes frames into the single shared slot without ever waiting for a
//! consumer. If the slot lock is busy the frame is dropped; if a primitive
//! fails unexpectedly the channel disables itself for good.
//!
//! ## Publish protocol
//!
//! 1. `try_acquire` the slot lock. Busy means drop, failure means disable.
//! 2. Drain a stale "frame ready" unit from the signal, if any.
//! 3. Rewrite the whole slot.
//! 4. Post the signal (count becomes exactly 1).
//! 5. Post the slot lock.

use std::time::Instant;

use frame::config::ChannelConfig;
use frame::consts::{LOCK_INITIAL, MAX_DATA, SIGNAL_INITIAL};
use frame::slot::{FrameSlot, SLOT_SIZE};
use nix::sys::stat::Mode;
use serde::Serialize;
use tracing::{debug, error, info, trace};

use crate::error::ShmResult;
use crate::names::ChannelNames;
use crate::region::SharedRegion;
use crate::semaphore::{NamedSemaphore, TryAcquire};

/// What happened to a frame handed to [`FrameChannel::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Frame written and signalled.
    Published,
    /// Slot lock busy; frame skipped.
    Dropped,
    /// Payload larger than `MAX_DATA`; frame skipped, channel still usable.
    Rejected,
    /// Channel was already disabled; nothing done.
    Disabled,
    /// A primitive failed; the channel is now disabled.
    Failed,
}

/// Per-handle publish counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishStats {
    /// Frames written and signalled.
    pub published: u64,
    /// Frames skipped because a consumer held the lock.
    pub dropped: u64,
    /// Frames skipped because they did not fit.
    pub rejected: u64,
    /// Fatal failures (at most one per handle).
    pub failed: u64,
}

/// Producer handle on a frame channel.
pub struct FrameChannel {
    names: ChannelNames,
    region: SharedRegion,
    signal: NamedSemaphore,
    lock: NamedSemaphore,
    remove_on_close: bool,
    disabled: bool,
    closed: bool,
    stats: PublishStats,
}

impl FrameChannel {
    /// Create or attach the memory object, frame signal and slot lock.
    ///
    /// `mode` gives the permission bits of newly created objects.
    /// With `remove_on_close` the names are unlinked on close (owner
    /// semantics); otherwise they are left for other participants.
    ///
    /// Either all three objects are acquired or none are: a failure at any
    /// step releases what was already acquired before returning the error.
    pub fn open(base: &str, mode: u32, remove_on_close: bool) -> ShmResult<Self> {
        let names = ChannelNames::new(base)?;
        let mode = Mode::from_bits_truncate((mode & 0o777) as libc::mode_t);

        info!("Using frame channel: {names}");

        let region = SharedRegion::create_or_attach(names.mem(), mode, SLOT_SIZE, remove_on_close)?;
        let signal = NamedSemaphore::create_or_attach(
            names.signal(),
            "signal",
            mode,
            SIGNAL_INITIAL,
            remove_on_close,
        )?;
        let lock = NamedSemaphore::create_or_attach(
            names.lock(),
            "lock",
            mode,
            LOCK_INITIAL,
            remove_on_close,
        )?;

        Ok(Self {
            names,
            region,
            signal,
            lock,
            remove_on_close,
            disabled: false,
            closed: false,
            stats: PublishStats::default(),
        })
    }

    /// Open a channel from a validated [`ChannelConfig`].
    pub fn from_config(config: &ChannelConfig) -> ShmResult<Self> {
        config.validate()?;
        Self::open(&config.base_name, config.mode, config.remove_on_close)
    }

    /// Publish one frame without blocking.
    ///
    /// Never returns an error: rejected and dropped frames leave the channel
    /// usable, a fatal failure disables it. The outcome is informational.
    pub fn publish(
        &mut self,
        payload: &[u8],
        format: u32,
        width: u32,
        height: u32,
        capture_ts: f64,
    ) -> PublishOutcome {
        if self.disabled {
            return PublishOutcome::Disabled;
        }

        if payload.len() > MAX_DATA {
            error!(
                channel = %self.names.base(),
                "Can't put frame: is too big ({} > {})",
                payload.len(),
                MAX_DATA
            );
            self.stats.rejected += 1;
            return PublishOutcome::Rejected;
        }

        let started = Instant::now();

        match self.lock.try_acquire() {
            TryAcquire::Acquired => {}
            TryAcquire::Contended => {
                trace!(channel = %self.names.base(), "Shared memory is busy now; frame skipped");
                self.stats.dropped += 1;
                return PublishOutcome::Dropped;
            }
            TryAcquire::Failed(errno) => {
                error!(channel = %self.names.base(), error = %errno, "Can't wait slot lock");
                return self.fail(false);
            }
        }

        trace!(channel = %self.names.base(), "Exposing new frame");

        // The previous frame was never consumed; this one supersedes it.
        if let TryAcquire::Failed(errno) = self.signal.try_acquire() {
            error!(channel = %self.names.base(), error = %errno, "Can't drain frame signal");
            return self.fail(true);
        }

        let Some(ptr) = self.region.as_mut_ptr() else {
            error!(channel = %self.names.base(), "Frame slot is not mapped");
            return self.fail(true);
        };
        // SAFETY: the mapping is SLOT_SIZE bytes, page aligned, and we hold
        // the slot lock, so no other participant touches it.
        let slot = unsafe { &mut *ptr.as_ptr().cast::<FrameSlot>() };
        if let Err(e) = slot.overwrite(format, width, height, capture_ts, payload) {
            error!(channel = %self.names.base(), error = %e, "Can't write frame slot");
            return self.fail(true);
        }

        if let Err(e) = self.signal.post() {
            error!(channel = %self.names.base(), error = %e, "Can't post frame signal");
            return self.fail(true);
        }
        if let Err(e) = self.lock.post() {
            error!(channel = %self.names.base(), error = %e, "Can't post slot lock");
            return self.fail(false);
        }

        self.stats.published += 1;
        debug!(
            channel = %self.names.base(),
            bytes = payload.len(),
            exposition_us = started.elapsed().as_micros() as u64,
            "Exposed new frame"
        );
        PublishOutcome::Published
    }

    /// Disable the channel after a fatal failure.
    ///
    /// With `holding_lock` the slot lock is handed back first. Every fatal
    /// point in the locked section comes either before the slot is touched
    /// or after it is completely written, so consumers never see a torn
    /// frame.
    fn fail(&mut self, holding_lock: bool) -> PublishOutcome {
        if holding_lock {
            if let Err(e) = self.lock.post() {
                error!(channel = %self.names.base(), error = %e, "Can't release slot lock after failure");
            }
        }
        error!(channel = %self.names.base(), "Frame channel completely disabled due to error");
        self.disabled = true;
        self.stats.failed += 1;
        PublishOutcome::Failed
    }

    /// Whether a fatal failure has disabled publishing.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Names of the channel objects.
    pub fn names(&self) -> &ChannelNames {
        &self.names
    }

    /// Publish counters of this handle.
    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Release all three objects.
    ///
    /// Every step runs even if an earlier one failed; failures are logged
    /// and the first one is returned.
    pub fn close(mut self) -> ShmResult<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> ShmResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let results = [
            self.lock.release(),
            self.signal.release(),
            self.region.release(),
        ];

        let mut first_err = None;
        for result in results {
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            None => {
                info!(
                    channel = %self.names.base(),
                    removed = self.remove_on_close,
                    "Closed frame channel"
                );
                Ok(())
            }
            Some(e) => {
                error!(channel = %self.names.base(), error = %e, "Frame channel closed with errors");
                Err(e)
            }
        }
    }
}

impl Drop for FrameChannel {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unique_base(tag: &str) -> String {
        static CTR: AtomicU32 = AtomicU32::new(0);
        let id = CTR.fetch_add(1, Ordering::Relaxed);
        format!("fc_chan_{tag}_{}_{id}", std::process::id())
    }

    fn owner(tag: &str) -> FrameChannel {
        FrameChannel::open(&unique_base(tag), 0o600, true).unwrap()
    }

    fn slot(channel: &FrameChannel) -> &FrameSlot {
        let ptr = channel.region.as_mut_ptr().unwrap();
        unsafe { &*ptr.as_ptr().cast::<FrameSlot>() }
    }

    #[test]
    fn fresh_channel_has_initial_state() {
        let channel = owner("fresh");
        assert_eq!(channel.lock.value().unwrap(), 1);
        assert_eq!(channel.signal.value().unwrap(), 0);
        assert_eq!(slot(&channel).used, 0);
        assert!(!channel.is_disabled());
    }

    #[test]
    fn publish_writes_and_signals() {
        let mut channel = owner("publish");
        let outcome = channel.publish(&[1, 2, 3], 4, 5, 6, 7.5);

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(channel.signal.value().unwrap(), 1);
        assert_eq!(channel.lock.value().unwrap(), 1);
        assert_eq!(slot(&channel).data().unwrap(), &[1, 2, 3]);
        assert_eq!(channel.stats().published, 1);
    }

    #[test]
    fn disabled_channel_is_inert() {
        let mut channel = owner("disabled");
        channel.disabled = true;

        assert_eq!(channel.publish(b"frame", 1, 1, 1, 1.0), PublishOutcome::Disabled);
        assert_eq!(channel.signal.value().unwrap(), 0);
        assert_eq!(slot(&channel).used, 0);
        assert_eq!(channel.stats(), PublishStats::default());
    }

    #[test]
    fn oversized_frame_is_rejected_without_disabling() {
        let mut channel = owner("oversize");
        let big = vec![0u8; MAX_DATA + 1];

        assert_eq!(channel.publish(&big, 1, 1, 1, 1.0), PublishOutcome::Rejected);
        assert!(!channel.is_disabled());
        assert_eq!(channel.stats().rejected, 1);
        assert_eq!(channel.publish(b"ok", 1, 1, 1, 1.0), PublishOutcome::Published);
    }

    #[test]
    fn lock_failure_disables_channel() {
        let mut channel = owner("lock_fail");
        channel.lock.release().unwrap();

        assert_eq!(channel.publish(b"x", 1, 1, 1, 1.0), PublishOutcome::Failed);
        assert!(channel.is_disabled());
        assert_eq!(channel.publish(b"x", 1, 1, 1, 1.0), PublishOutcome::Disabled);
        assert_eq!(channel.stats().failed, 1);
    }

    #[test]
    fn signal_failure_releases_lock_and_disables() {
        let base = unique_base("sig_fail");
        let mut channel = FrameChannel::open(&base, 0o600, true).unwrap();
        let peer_lock = NamedSemaphore::attach(channel.names().lock(), "lock").unwrap();
        channel.signal.release().unwrap();

        assert_eq!(channel.publish(b"x", 1, 1, 1, 1.0), PublishOutcome::Failed);
        assert!(channel.is_disabled());
        // Lock handed back on the fatal path.
        assert_eq!(peer_lock.value().unwrap(), 1);
        assert_eq!(slot(&channel).used, 0);
    }

    #[test]
    fn close_is_clean() {
        let channel = owner("close");
        let names = channel.names().clone();
        channel.close().unwrap();
        assert!(names.presence().unwrap().is_absent());
    }

    #[test]
    fn from_config_validates() {
        let config = ChannelConfig::new("bad/name");
        assert!(matches!(
            FrameChannel::from_config(&config),
            Err(crate::error::ShmError::Config { .. })
        ));
    }
}
