//! Frame slot resident in shared memory.
//!
//! Defines the `FrameSlot` struct (`#[repr(C)]`, fixed size) that fills the
//! `.mem` object of a frame channel, and the `FrameMeta` copy of its
//! metadata fields.
//!
//! ## Access Protocol
//!
//! The slot has no internal synchronization. Every read and every write
//! must happen while holding the channel's slot lock. The producer always
//! rewrites the whole slot; it never patches individual fields.
//!
//! A `FrameSlot` is far too large for the stack and is never constructed by
//! value. It only exists behind a pointer into the mapping.

use static_assertions::const_assert_eq;
use thiserror::Error;

use crate::consts::MAX_DATA;

/// Shared frame slot: metadata followed by the payload buffer.
///
/// Layout (64-bit targets):
///   [0..4]    format:     u32
///   [4..8]    width:      u32
///   [8..12]   height:     u32
///   [12..16]  _pad:       (implicit padding for f64 align)
///   [16..24]  capture_ts: f64
///   [24..32]  used:       usize
///   [32..]    payload:    [u8; MAX_DATA]
#[repr(C)]
pub struct FrameSlot {
    /// Payload encoding tag (codec or pixel format).
    pub format: u32,
    /// Frame width in producer units.
    pub width: u32,
    /// Frame height in producer units.
    pub height: u32,
    /// Capture time, `CLOCK_MONOTONIC` seconds.
    pub capture_ts: f64,
    /// Number of valid bytes in `payload`. Never above `MAX_DATA`.
    pub used: usize,
    /// Payload buffer. Bytes past `used` are stale.
    pub payload: [u8; MAX_DATA],
}

/// Size of the shared memory object backing one channel.
pub const SLOT_SIZE: usize = core::mem::size_of::<FrameSlot>();

/// Offset of the payload buffer within the slot.
pub const PAYLOAD_OFFSET: usize = core::mem::offset_of!(FrameSlot, payload);

#[cfg(target_pointer_width = "64")]
const _: () = {
    const_assert_eq!(core::mem::offset_of!(FrameSlot, format), 0);
    const_assert_eq!(core::mem::offset_of!(FrameSlot, width), 4);
    const_assert_eq!(core::mem::offset_of!(FrameSlot, height), 8);
    const_assert_eq!(core::mem::offset_of!(FrameSlot, capture_ts), 16);
    const_assert_eq!(core::mem::offset_of!(FrameSlot, used), 24);
    const_assert_eq!(PAYLOAD_OFFSET, 32);
    const_assert_eq!(SLOT_SIZE, 32 + MAX_DATA);
};

/// Metadata of one frame, detached from the slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMeta {
    /// Payload encoding tag.
    pub format: u32,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Capture time, `CLOCK_MONOTONIC` seconds.
    pub capture_ts: f64,
    /// Valid payload bytes.
    pub used: usize,
}

/// Errors raised by slot accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Payload does not fit into the slot.
    #[error("payload is too big ({size} > {max})")]
    PayloadTooLarge {
        /// Offered payload size.
        size: usize,
        /// Slot capacity.
        max: usize,
    },

    /// The `used` field holds an impossible value.
    #[error("slot reports {used} used bytes, capacity is {max}")]
    UsedOutOfRange {
        /// Value found in the slot.
        used: usize,
        /// Slot capacity.
        max: usize,
    },
}

impl FrameSlot {
    /// Overwrite the whole slot with a new frame.
    ///
    /// Metadata is written first, then the payload. Leaves the slot untouched
    /// when `payload` exceeds `MAX_DATA`.
    pub fn overwrite(
        &mut self,
        format: u32,
        width: u32,
        height: u32,
        capture_ts: f64,
        payload: &[u8],
    ) -> Result<(), SlotError> {
        if payload.len() > MAX_DATA {
            return Err(SlotError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_DATA,
            });
        }

        self.format = format;
        self.width = width;
        self.height = height;
        self.capture_ts = capture_ts;
        self.used = payload.len();
        self.payload[..payload.len()].copy_from_slice(payload);
        Ok(())
    }

    /// Copy of the metadata fields.
    #[inline]
    pub fn meta(&self) -> FrameMeta {
        FrameMeta {
            format: self.format,
            width: self.width,
            height: self.height,
            capture_ts: self.capture_ts,
            used: self.used,
        }
    }

    /// Valid part of the payload buffer.
    pub fn data(&self) -> Result<&[u8], SlotError> {
        if self.used > MAX_DATA {
            return Err(SlotError::UsedOutOfRange {
                used: self.used,
                max: MAX_DATA,
            });
        }
        Ok(&self.payload[..self.used])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Heap-allocate a zeroed slot; all-zero bytes are a valid `FrameSlot`.
    fn zeroed_slot() -> Box<FrameSlot> {
        let layout = std::alloc::Layout::new::<FrameSlot>();
        unsafe {
            let ptr = std::alloc::alloc_zeroed(layout) as *mut FrameSlot;
            assert!(!ptr.is_null());
            Box::from_raw(ptr)
        }
    }

    #[test]
    fn slot_size_covers_payload() {
        assert!(SLOT_SIZE >= MAX_DATA + PAYLOAD_OFFSET);
        assert_eq!(core::mem::align_of::<FrameSlot>(), core::mem::align_of::<f64>().max(core::mem::align_of::<usize>()));
    }

    #[test]
    fn overwrite_sets_every_field() {
        let mut slot = zeroed_slot();
        let payload: Vec<u8> = (1..=10).collect();

        slot.overwrite(1, 640, 480, 100.0, &payload).unwrap();

        let meta = slot.meta();
        assert_eq!(meta.format, 1);
        assert_eq!(meta.width, 640);
        assert_eq!(meta.height, 480);
        assert_eq!(meta.capture_ts, 100.0);
        assert_eq!(meta.used, 10);
        assert_eq!(slot.data().unwrap(), &payload[..]);
    }

    #[test]
    fn shorter_frame_shrinks_used() {
        let mut slot = zeroed_slot();
        slot.overwrite(1, 2, 3, 1.0, &[0xAA; 64]).unwrap();
        slot.overwrite(1, 2, 3, 2.0, &[0xBB; 8]).unwrap();

        assert_eq!(slot.data().unwrap(), &[0xBB; 8]);
        // Stale bytes past `used` are left as they were.
        assert_eq!(slot.payload[8], 0xAA);
    }

    #[test]
    fn oversized_payload_leaves_slot_untouched() {
        let mut slot = zeroed_slot();
        slot.overwrite(7, 1, 1, 5.0, b"keep").unwrap();

        let big = vec![0u8; MAX_DATA + 1];
        let err = slot.overwrite(9, 2, 2, 6.0, &big).unwrap_err();

        assert_eq!(
            err,
            SlotError::PayloadTooLarge {
                size: MAX_DATA + 1,
                max: MAX_DATA
            }
        );
        assert_eq!(slot.meta().format, 7);
        assert_eq!(slot.data().unwrap(), b"keep");
    }

    #[test]
    fn corrupt_used_is_reported() {
        let mut slot = zeroed_slot();
        slot.used = MAX_DATA + 5;
        assert!(matches!(
            slot.data(),
            Err(SlotError::UsedOutOfRange { .. })
        ));
    }
}
