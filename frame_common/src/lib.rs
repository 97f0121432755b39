//! Frame Common Library
//!
//! This crate holds the definitions every participant of a frame channel
//! must agree on: the slot layout in shared memory, the payload capacity,
//! the resource name suffixes and configuration loading.
//!
//! # Module Structure
//!
//! - [`consts`] - Capacity, name suffixes and default permissions
//! - [`slot`] - `#[repr(C)]` frame slot resident in shared memory
//! - [`clock`] - Monotonic clock used for capture timestamps
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use frame_common::prelude::*;
//!
//! assert!(SLOT_SIZE > MAX_DATA);
//! ```

pub mod clock;
pub mod config;
pub mod consts;
pub mod prelude;
pub mod slot;
