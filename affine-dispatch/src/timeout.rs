// SPDX-License-Identifier: MIT
//

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::queue::HomeQueue;

/// Something that can be cancelled. Disposing more than once is a no-op.
pub trait DisposableHandle {
    fn dispose(&self);
}

/// Cancels a callback scheduled with
/// [`AffineDispatcher::invoke_on_timeout`](crate::AffineDispatcher::invoke_on_timeout).
///
/// The handle only points back at the pending callback; the queue owns it.
/// Dropping the handle leaves the callback scheduled.
///
/// Dispose and fire may race. A successful dispose keeps the callback from
/// running, but it cannot retract a callback the home thread has already
/// started.
pub struct TimeoutHandle<Q: HomeQueue> {
    queue: Weak<Q>,
    token: Option<Q::Token>,
    disposed: AtomicBool,
}

impl<Q: HomeQueue> TimeoutHandle<Q> {
    pub(crate) fn new(queue: &Arc<Q>, token: Option<Q::Token>) -> Self {
        Self {
            queue: Arc::downgrade(queue),
            token,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<Q: HomeQueue> DisposableHandle for TimeoutHandle<Q> {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(token) = &self.token else {
            // the post was rejected, nothing is pending
            return;
        };
        if let Some(queue) = self.queue.upgrade() {
            queue.remove(token);
        }
    }
}

impl<Q: HomeQueue> fmt::Debug for TimeoutHandle<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutHandle")
            .field("pending", &self.token.is_some())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
