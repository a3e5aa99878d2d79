// SPDX-License-Identifier: MIT
//
//! Deterministic stand-ins for the external queue and clock.
//!
//! Enabled by the `test-util` feature. Both run everything on the thread that
//! drives them, which plays the part of the home thread.

mod manual_clock;
mod manual_queue;

pub use manual_clock::{ManualClock, ManualClockSource};
pub use manual_queue::{ManualQueue, ManualToken};
