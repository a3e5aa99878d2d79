// SPDX-License-Identifier: MIT
//

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::clamp::delay_millis;
use crate::continuation::Continuation;
use crate::dispatcher::AffineDispatcher;
use crate::frame::{ClockCell, ClockSource, FrameClock};
use crate::queue::{HomeQueue, Task};
use crate::timeout::TimeoutHandle;

/// Dispatcher bound to one [`HomeQueue`].
///
/// Equality and hashing follow the queue, not this wrapper: two dispatchers
/// over the same `Arc` are interchangeable as map keys, whatever their
/// labels. Clones share the cached frame clock.
pub struct HomeDispatcher<Q: HomeQueue> {
    queue: Arc<Q>,
    label: Option<Arc<str>>,
    clock_source: Arc<dyn ClockSource>,
    clock: Arc<ClockCell>,
}

impl<Q: HomeQueue> HomeDispatcher<Q> {
    pub fn new(queue: Arc<Q>, clock_source: Arc<dyn ClockSource>) -> Self {
        Self {
            queue,
            label: None,
            clock_source,
            clock: Arc::new(ClockCell::default()),
        }
    }

    /// Dispatcher for the application's main queue. The caller supplies the
    /// queue; nothing is looked up globally.
    pub fn main(queue: Arc<Q>, clock_source: Arc<dyn ClockSource>) -> Self {
        Self::new(queue, clock_source).with_label("Main")
    }

    /// Attach a diagnostic label. Labels play no part in equality.
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Whether both dispatchers feed the same queue.
    pub fn same_queue(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.queue, &other.queue)
    }

    /// Address of the wrapped queue allocation.
    pub fn queue_identity(&self) -> usize {
        Arc::as_ptr(&self.queue) as *const () as usize
    }

    pub fn is_clock_resolved(&self) -> bool {
        self.clock.is_resolved()
    }

    fn post_delayed(&self, task: Task, delay: Duration) -> Option<Q::Token> {
        let millis = delay_millis(delay);
        let token = self.queue.post_delayed(task, millis);
        if token.is_none() {
            warn!("{self}: home queue rejected a task delayed by {millis}ms, it will not run");
        }
        token
    }
}

/// Wrap `queue` in a dispatcher, optionally labelled.
pub fn as_dispatcher<Q: HomeQueue>(
    queue: Arc<Q>,
    clock_source: Arc<dyn ClockSource>,
    label: Option<&str>,
) -> HomeDispatcher<Q> {
    let dispatcher = HomeDispatcher::new(queue, clock_source);
    match label {
        Some(label) => dispatcher.with_label(label),
        None => dispatcher,
    }
}

fn post_frame_callback(clock: &dyn FrameClock, continuation: Box<dyn Continuation<u64>>) {
    clock.post_frame_callback(Box::new(move |timestamp: u64| continuation.resume_inline(timestamp)));
}

impl<Q: HomeQueue> AffineDispatcher for HomeDispatcher<Q> {
    type Timeout = TimeoutHandle<Q>;

    fn dispatch(&self, task: Task) {
        trace!("{self}: dispatch");
        if !self.queue.post(task) {
            warn!("{self}: home queue rejected a task, it will not run");
        }
    }

    fn schedule_resume_after_delay(&self, delay: Duration, continuation: Box<dyn Continuation<()>>) {
        // the timer fires on the home thread already, so resume right there
        self.post_delayed(Box::new(move || continuation.resume_inline(())), delay);
    }

    fn invoke_on_timeout(&self, delay: Duration, task: Task) -> TimeoutHandle<Q> {
        let token = self.post_delayed(task, delay);
        TimeoutHandle::new(&self.queue, token)
    }

    fn post_frame_resume(&self, continuation: Box<dyn Continuation<u64>>) {
        if let Some(clock) = self.clock.get() {
            post_frame_callback(clock.as_ref(), continuation);
            return;
        }

        // the clock can only be resolved on the home thread
        let cell = self.clock.clone();
        let source = self.clock_source.clone();
        let name = self.to_string();
        self.dispatch(Box::new(move || {
            let resolved_before = cell.is_resolved();
            let clock = cell.resolve(source.as_ref());
            if !resolved_before {
                debug!("{name}: resolved frame clock");
            }
            post_frame_callback(clock.as_ref(), continuation);
        }));
    }
}

impl<Q: HomeQueue> Clone for HomeDispatcher<Q> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            label: self.label.clone(),
            clock_source: self.clock_source.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<Q: HomeQueue> PartialEq for HomeDispatcher<Q> {
    fn eq(&self, other: &Self) -> bool {
        self.same_queue(other)
    }
}

impl<Q: HomeQueue> Eq for HomeDispatcher<Q> {}

impl<Q: HomeQueue> Hash for HomeDispatcher<Q> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.queue_identity().hash(state);
    }
}

impl<Q: HomeQueue> fmt::Display for HomeDispatcher<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => f.write_str(label),
            None => write!(f, "{:?}", self.queue),
        }
    }
}

impl<Q: HomeQueue> fmt::Debug for HomeDispatcher<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeDispatcher")
            .field("label", &self.label)
            .field("queue", &self.queue)
            .field("clock_resolved", &self.clock.is_resolved())
            .finish()
    }
}
