// SPDX-License-Identifier: MIT
//
//! Dispatcher capabilities and their single home-queue implementation.

use std::time::Duration;

use crate::continuation::{suspend, Continuation, Resumption};
use crate::queue::Task;
use crate::timeout::DisposableHandle;

mod home_dispatcher;

pub use home_dispatcher::{as_dispatcher, HomeDispatcher};

/// Runs work on one specific thread.
///
/// Every method submits and returns; none of them waits for the work.
pub trait AffineDispatcher: Send + Sync {
    type Timeout: DisposableHandle;

    /// Run `task` on the home thread at some later point.
    fn dispatch(&self, task: Task);

    /// Resume `continuation` on the home thread once `delay` has elapsed,
    /// straight from the timer callback.
    fn schedule_resume_after_delay(&self, delay: Duration, continuation: Box<dyn Continuation<()>>);

    /// Run `task` on the home thread once `delay` has elapsed, unless the
    /// returned handle is disposed first.
    fn invoke_on_timeout(&self, delay: Duration, task: Task) -> Self::Timeout;

    /// Resume `continuation` with the timestamp of the next clock tick,
    /// straight from the tick callback.
    fn post_frame_resume(&self, continuation: Box<dyn Continuation<u64>>);
}

/// Async conveniences over [`AffineDispatcher`].
///
/// The returned futures are already scheduled when these methods return;
/// awaiting them only observes the resumption.
pub trait AffineDispatcherExt: AffineDispatcher {
    /// Completes once `delay` has elapsed on the home thread.
    fn delay(&self, delay: Duration) -> Resumption<()> {
        let (continuation, resumption) = suspend();
        self.schedule_resume_after_delay(delay, continuation);
        resumption
    }

    /// Completes with the timestamp, in nanoseconds, of the next tick.
    fn await_frame(&self) -> Resumption<u64> {
        let (continuation, resumption) = suspend();
        self.post_frame_resume(continuation);
        resumption
    }

    /// Resume `continuation` through a fresh dispatch instead of inline.
    /// Costs one more trip through the home queue.
    fn resume_via_dispatch<T: Send + 'static>(&self, continuation: Box<dyn Continuation<T>>, value: T) {
        self.dispatch(Box::new(move || continuation.resume_inline(value)));
    }
}

impl<D: AffineDispatcher + ?Sized> AffineDispatcherExt for D {}
