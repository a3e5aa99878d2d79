// SPDX-License-Identifier: MIT
//
//! # Design: Home-Thread Looper
//!
//! ## Overview
//! A named thread that owns a single-threaded executor and processes every
//! message posted to it, in order.
//!
//! - Posting never blocks: messages go through an unbounded channel.
//! - Delayed messages become local timer tasks on the home thread.
//! - Removing a delayed message flips its cancel flag right away and aborts
//!   the timer task once the home thread sees the removal.
//! - Quitting closes the channel. Messages already queued still run, pending
//!   timers are aborted, then the thread exits.
//!
//! ```text
//!         +-----------+  +-----------+  +-----------+
//!         | thread A  |  | thread B  |  | home      |
//!         +-----+-----+  +-----+-----+  +-----+-----+
//!               |              |              |
//!               v              v              v
//!         +-------------------------------------------+
//!         |        unbounded channel (Message)        |
//!         +---------------------+---------------------+
//!                               |
//!                     +---------v---------+
//!                     |  home_loop()      |---- Run(task) -> task()
//!                     |  on LocalPool     |
//!                     +---------+---------+
//!                               | Delayed
//!                     +---------v---------+
//!                     | Abortable timer   |---- Timer::at    -> task()
//!                     +-------------------+
//! ```

mod home_thread;

pub use home_thread::{Looper, LooperToken};
