// SPDX-License-Identifier: MIT
//

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use affine_dispatch::{ClockSource, FrameClock, HomeDispatcher};
use affine_looper::{Looper, LooperConfig, TickerClockSource};

/// Wraps the ticker source and counts how often the clock gets resolved.
#[derive(Debug)]
pub struct CountingSource {
    inner: Arc<TickerClockSource>,
    resolutions: AtomicUsize,
}

impl CountingSource {
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

impl ClockSource for CountingSource {
    fn instance(&self) -> Arc<dyn FrameClock> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.inner.instance()
    }
}

/// A running looper with a dispatcher on top. Quits and joins on drop.
pub struct Home {
    pub looper: Arc<Looper>,
    pub source: Arc<CountingSource>,
    pub dispatcher: HomeDispatcher<Looper>,
}

pub fn spawn_home(name: &str, frame_interval: Duration) -> Home {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = LooperConfig::named(name);
    let looper = Looper::spawn(&config).unwrap_or_else(|e| panic!("failed to spawn looper {name}: {e}"));
    let source = Arc::new(CountingSource {
        inner: TickerClockSource::new(&looper, frame_interval),
        resolutions: AtomicUsize::new(0),
    });
    let dispatcher = HomeDispatcher::new(looper.clone(), source.clone()).with_label(name);

    Home {
        looper,
        source,
        dispatcher,
    }
}

impl Drop for Home {
    fn drop(&mut self) {
        if let Err(e) = self.looper.wait_until_finished() {
            log::error!("failed to stop looper {}: {e}", self.looper.name());
        }
    }
}
