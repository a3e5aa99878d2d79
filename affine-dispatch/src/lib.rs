// SPDX-License-Identifier: MIT
//
//! # affine-dispatch
//!
//! Binds deferred work to a single *home thread* that is fed by an external,
//! thread-affine message queue. On top of plain dispatch it offers two kinds
//! of timed execution:
//!
//! - resuming a suspended computation after a delay, and
//! - resuming it once on the next tick of an external periodic clock.
//!
//! The queue, the clock and the thread are all injected. This crate only
//! feeds them.
//!
//! ```text
//!         caller threads                  home thread
//!        +---------------+   post    +---------------------+
//!        | dispatch()    |---------->|                     |
//!        | delay()       |  delayed  |   HomeQueue loop    |
//!        | on_timeout()  |---------->|   (not ours)        |
//!        | await_frame() |           |                     |
//!        +-------+-------+           +----------+----------+
//!                |  fast path                   | resume_inline
//!                v                              v
//!        +---------------+   tick    +---------------------+
//!        |  FrameClock   |---------->|   Continuation      |
//!        +---------------+           +---------------------+
//! ```

pub mod clamp;
pub mod continuation;
pub mod dispatcher;
pub mod frame;
pub mod queue;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod timeout;

pub use crate::clamp::{clamp_delay, delay_millis, MAX_DELAY, MAX_DELAY_MILLIS};
pub use crate::continuation::{suspend, Continuation, Resumption};
pub use crate::dispatcher::{as_dispatcher, AffineDispatcher, AffineDispatcherExt, HomeDispatcher};
pub use crate::frame::{ClockSource, FrameCallback, FrameClock};
pub use crate::queue::{HomeQueue, Task};
pub use crate::timeout::{DisposableHandle, TimeoutHandle};
