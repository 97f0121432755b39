//! Monotonic clock helpers.
//!
//! Capture timestamps travel through the slot as `f64` seconds of
//! `CLOCK_MONOTONIC`, so producer and consumers on the same host can compute
//! latencies without wall-clock jumps.

use nix::time::{ClockId, clock_gettime};
use tracing::warn;

/// Current `CLOCK_MONOTONIC` time in seconds.
pub fn try_monotonic_secs() -> nix::Result<f64> {
    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
    Ok(ts.tv_sec() as f64 + ts.tv_nsec() as f64 / 1_000_000_000.0)
}

/// Like [`try_monotonic_secs`], for timestamping frames.
///
/// A clock failure is logged and yields `0.0`, which consumers see as
/// "no capture time".
pub fn monotonic_secs() -> f64 {
    try_monotonic_secs().unwrap_or_else(|errno| {
        warn!(error = %errno, "Can't read monotonic clock");
        0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_never_goes_back() {
        let a = monotonic_secs();
        let b = monotonic_secs();
        assert!(a > 0.0);
        assert!(b >= a);
    }

    #[test]
    fn clock_read_reports_success() {
        let secs = try_monotonic_secs().unwrap();
        assert!(secs > 0.0);
        assert!(monotonic_secs() >= secs);
    }
}
