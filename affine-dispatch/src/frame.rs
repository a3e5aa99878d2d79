// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, OnceLock};

/// Called once with the tick timestamp in nanoseconds.
pub type FrameCallback = Box<dyn FnOnce(u64) + Send + 'static>;

/// An external periodic clock, e.g. a display refresh signal.
pub trait FrameClock: Send + Sync + 'static {
    /// Register `callback` for the next tick only.
    fn post_frame_callback(&self, callback: FrameCallback);
}

/// Hands out the process-wide [`FrameClock`].
pub trait ClockSource: Send + Sync + 'static {
    /// Must only be called on the home thread.
    fn instance(&self) -> Arc<dyn FrameClock>;
}

/// Per-dispatcher cache of the resolved clock.
///
/// Set-if-absent, read from any thread. Resolution itself takes no lock:
/// every resolution yields the same clock, so when two race the first one
/// stored stays and the other is simply dropped.
#[derive(Default)]
pub(crate) struct ClockCell {
    slot: OnceLock<Arc<dyn FrameClock>>,
}

impl ClockCell {
    pub(crate) fn get(&self) -> Option<Arc<dyn FrameClock>> {
        self.slot.get().cloned()
    }

    /// Resolve through `source` unless a clock is already cached.
    /// Home thread only.
    pub(crate) fn resolve(&self, source: &dyn ClockSource) -> Arc<dyn FrameClock> {
        if let Some(clock) = self.get() {
            return clock;
        }
        let clock = source.instance();
        match self.slot.set(clock.clone()) {
            Ok(()) => clock,
            Err(_duplicate) => self.get().unwrap_or(clock),
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }
}
