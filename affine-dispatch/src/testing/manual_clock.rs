// SPDX-License-Identifier: MIT
//

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::frame::{ClockSource, FrameCallback, FrameClock};

/// A periodic clock that only ticks when told to.
#[derive(Default)]
pub struct ManualClock {
    callbacks: Mutex<Vec<FrameCallback>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver one tick. Callbacks registered while this runs wait for the
    /// next tick. Returns how many callbacks ran.
    pub fn tick(&self, timestamp_nanos: u64) -> usize {
        let callbacks = std::mem::take(
            &mut *self
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let count = callbacks.len();
        for callback in callbacks {
            callback(timestamp_nanos);
        }
        count
    }
}

impl FrameClock for ManualClock {
    fn post_frame_callback(&self, callback: FrameCallback) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }
}

/// Always resolves to the same [`ManualClock`] and counts resolutions.
pub struct ManualClockSource {
    clock: Arc<ManualClock>,
    resolutions: AtomicUsize,
}

impl ManualClockSource {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new()),
            resolutions: AtomicUsize::new(0),
        }
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

impl Default for ManualClockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for ManualClockSource {
    fn instance(&self) -> Arc<dyn FrameClock> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.clock.clone()
    }
}
