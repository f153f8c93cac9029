//! fmradio library: portable TEA5767 FM tuner control.
//!
//! Everything between the I2C bus and the remote peers lives here: the
//! register codec, the frequency synthesizer, the autoscan state machine,
//! command parsing and dispatch, persistence of presets and settings, and
//! the control loop that ties them together. Platform binaries provide the
//! bus, a key-value store and a transport; the library is testable on any
//! host with `cargo test --features std`.
//!
//! The crate is `no_std` and allocation-free by default. The `std` feature
//! adds [`inbox`], a bounded drop-on-full channel between a transport's
//! receive callback and the control loop.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod board;
pub mod codec;
pub mod comm;
pub mod control;
pub mod dispatch;
#[cfg(feature = "std")]
pub mod inbox;
pub mod protocol;
pub mod search;
pub mod storage;
pub mod tuner;

#[cfg(test)]
mod testing;
