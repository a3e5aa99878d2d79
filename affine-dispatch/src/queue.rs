// SPDX-License-Identifier: MIT
//

use std::fmt::Debug;

/// A unit of work handed to a home queue. It runs at most once, on the home
/// thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The external, thread-affine FIFO that owns the home thread.
///
/// Implementations are shared as `Arc<Q>`. The `Arc` allocation *is* the queue
/// identity: dispatchers built from clones of the same `Arc` are equal.
///
/// All methods may be called from any thread.
pub trait HomeQueue: Debug + Send + Sync + 'static {
    /// Handle for a delayed post, used to take it back out of the queue.
    type Token: Send + Sync + 'static;

    /// Enqueue `task` behind everything already posted from this thread.
    ///
    /// Returns `false` if the queue has shut down. The task is dropped
    /// without running in that case.
    fn post(&self, task: Task) -> bool;

    /// Enqueue `task` to run no earlier than `delay_millis` from now.
    ///
    /// Returns `None` if the queue has shut down.
    fn post_delayed(&self, task: Task, delay_millis: u64) -> Option<Self::Token>;

    /// Take a delayed task back out of the queue. A no-op if it already ran
    /// or was already removed.
    fn remove(&self, token: &Self::Token);
}
