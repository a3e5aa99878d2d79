// SPDX-License-Identifier: MIT
//
//! A periodic frame clock driven by the looper's own timers.
//!
//! Ticks sit on a fixed grid `origin + k * interval` and carry the timestamp
//! `k * interval` in nanoseconds. The clock only arms a timer while somebody
//! waits for a frame, the way a display only delivers vsync to those who
//! asked for it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant};

use affine_dispatch::{delay_millis, ClockSource, FrameCallback, FrameClock, HomeQueue};
use log::{debug, warn};
use smallvec::SmallVec;

use crate::looper::Looper;

#[derive(Default)]
struct TickState {
    callbacks: SmallVec<[FrameCallback; 4]>,
    /// Grid index of the tick a timer is armed for.
    scheduled: Option<u64>,
    /// Grid index of the last delivered tick.
    delivered: Option<u64>,
}

/// Frame clock ticking every `interval` on one looper.
pub struct TickerClock {
    looper: Weak<Looper>,
    me: Weak<TickerClock>,
    origin: Instant,
    interval: Duration,
    state: Mutex<TickState>,
}

impl TickerClock {
    pub fn new(looper: &Arc<Looper>, interval: Duration) -> Arc<Self> {
        Self::with_looper(Arc::downgrade(looper), interval)
    }

    fn with_looper(looper: Weak<Looper>, interval: Duration) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            looper,
            me: me.clone(),
            origin: Instant::now(),
            interval: interval.max(Duration::from_millis(1)),
            state: Mutex::new(TickState::default()),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn state(&self) -> MutexGuard<'_, TickState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn interval_nanos(&self) -> u64 {
        self.interval.as_nanos() as u64
    }

    /// First grid index after both now and `delivered`.
    fn next_tick(&self, delivered: Option<u64>) -> u64 {
        let elapsed = self.origin.elapsed().as_nanos() as u64;
        let upcoming = elapsed / self.interval_nanos() + 1;
        match delivered {
            Some(last) => upcoming.max(last + 1),
            None => upcoming,
        }
    }

    fn arm(&self, tick: u64) {
        let Some(looper) = self.looper.upgrade() else {
            debug!("Ticker: looper is gone, frame callbacks dropped");
            self.drop_waiters();
            return;
        };
        let offset = Duration::from_nanos(tick.saturating_mul(self.interval_nanos()));
        let delay = self
            .origin
            .checked_add(offset)
            .map_or(Duration::ZERO, |deadline| deadline.saturating_duration_since(Instant::now()));
        let me = self.me.clone();
        let posted = looper.post_delayed(
            Box::new(move || {
                if let Some(clock) = me.upgrade() {
                    clock.fire();
                }
            }),
            delay_millis(delay),
        );
        if posted.is_none() {
            debug!("Ticker: looper {} is quitting, frame callbacks dropped", looper.name());
            self.drop_waiters();
        }
    }

    fn drop_waiters(&self) {
        let mut state = self.state();
        state.scheduled = None;
        state.callbacks.clear();
    }

    fn fire(&self) {
        let (callbacks, timestamp) = {
            let mut state = self.state();
            let Some(tick) = state.scheduled.take() else {
                return;
            };
            state.delivered = Some(tick);
            (
                std::mem::take(&mut state.callbacks),
                tick.saturating_mul(self.interval_nanos()),
            )
        };
        // callbacks registering again land on the next tick
        for callback in callbacks {
            callback(timestamp);
        }
    }
}

impl FrameClock for TickerClock {
    fn post_frame_callback(&self, callback: FrameCallback) {
        let tick = {
            let mut state = self.state();
            state.callbacks.push(callback);
            if state.scheduled.is_some() {
                return;
            }
            let tick = self.next_tick(state.delivered);
            state.scheduled = Some(tick);
            tick
        };
        self.arm(tick);
    }
}

impl fmt::Debug for TickerClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("TickerClock")
            .field("interval", &self.interval)
            .field("waiting", &state.callbacks.len())
            .field("scheduled", &state.scheduled)
            .field("delivered", &state.delivered)
            .finish()
    }
}

/// Lazily creates the one [`TickerClock`] of a looper.
pub struct TickerClockSource {
    looper: Weak<Looper>,
    interval: Duration,
    clock: OnceLock<Arc<TickerClock>>,
}

impl TickerClockSource {
    pub fn new(looper: &Arc<Looper>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            looper: Arc::downgrade(looper),
            interval,
            clock: OnceLock::new(),
        })
    }
}

impl ClockSource for TickerClockSource {
    fn instance(&self) -> Arc<dyn FrameClock> {
        let clock = self.clock.get_or_init(|| {
            if let Some(looper) = self.looper.upgrade() {
                if !looper.is_home_thread() {
                    warn!("Ticker: clock for {} resolved off its home thread", looper.name());
                }
                debug!("Ticker: clock for {} ticks every {:?}", looper.name(), self.interval);
            }
            TickerClock::with_looper(self.looper.clone(), self.interval)
        });
        clock.clone()
    }
}

impl fmt::Debug for TickerClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickerClockSource")
            .field("interval", &self.interval)
            .field("resolved", &self.clock.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LooperConfig;
    use std::sync::mpsc;

    fn spawn(name: &str) -> Arc<Looper> {
        let _ = env_logger::builder().is_test(true).try_init();
        Looper::spawn(&LooperConfig::named(name)).expect("failed to spawn looper")
    }

    #[test]
    fn ticks_strictly_increase() {
        let looper = spawn("ticker");
        let clock = TickerClock::new(&looper, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel();

        let mut stamps = Vec::new();
        for _ in 0..4 {
            let tx = tx.clone();
            clock.post_frame_callback(Box::new(move |t: u64| tx.send(t).unwrap()));
            stamps.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }

        let interval = clock.interval().as_nanos() as u64;
        assert!(stamps.windows(2).all(|w| w[0] < w[1]), "{stamps:?}");
        assert!(stamps.iter().all(|t| t % interval == 0));
        looper.wait_until_finished().unwrap();
    }

    #[test]
    fn waiters_share_a_tick() {
        let looper = spawn("ticker-shared");
        let clock = TickerClock::new(&looper, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel();

        // register from the home thread so no tick can slip in between
        let on_home = clock.clone();
        looper.post(Box::new(move || {
            for _ in 0..3 {
                let tx = tx.clone();
                on_home.post_frame_callback(Box::new(move |t: u64| tx.send(t).unwrap()));
            }
        }));
        let stamps: Vec<u64> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();

        assert!(stamps.iter().all(|t| *t == stamps[0]));
        looper.wait_until_finished().unwrap();
    }

    #[test]
    fn re_registration_waits_for_next_tick() {
        let looper = spawn("ticker-again");
        let clock = TickerClock::new(&looper, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel();

        let again = clock.clone();
        clock.post_frame_callback(Box::new(move |t1: u64| {
            tx.send(t1).unwrap();
            again.post_frame_callback(Box::new(move |t2: u64| tx.send(t2).unwrap()));
        }));

        let t1 = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let t2 = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(t1 < t2);
        looper.wait_until_finished().unwrap();
    }

    #[test]
    fn source_hands_out_one_clock() {
        let looper = spawn("ticker-source");
        let source = TickerClockSource::new(&looper, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel();

        let on_home = source.clone();
        looper.post(Box::new(move || {
            let a = on_home.instance();
            let b = on_home.instance();
            tx.send(Arc::ptr_eq(&a, &b)).unwrap();
        }));

        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        looper.wait_until_finished().unwrap();
    }

    #[test]
    fn quitting_looper_drops_waiters() {
        let looper = spawn("ticker-quit");
        let clock = TickerClock::new(&looper, Duration::from_millis(5));
        looper.wait_until_finished().unwrap();

        clock.post_frame_callback(Box::new(|_: u64| panic!("no tick after quit")));
        assert!(format!("{clock:?}").contains("waiting: 0"));
    }

    #[test]
    fn interval_has_a_floor() {
        let looper = spawn("ticker-floor");
        let clock = TickerClock::new(&looper, Duration::ZERO);
        assert_eq!(clock.interval(), Duration::from_millis(1));
        looper.wait_until_finished().unwrap();
    }

    #[test]
    fn dropped_looper_drops_waiters() {
        let looper = spawn("ticker-gone");
        let clock = TickerClock::new(&looper, Duration::from_millis(5));
        looper.wait_until_finished().unwrap();
        drop(looper);

        for _ in 0..3 {
            clock.post_frame_callback(Box::new(|_: u64| panic!("no tick without a looper")));
        }
        let debug = format!("{clock:?}");
        assert!(debug.contains("waiting: 0"), "{debug}");
        assert!(debug.contains("scheduled: None"), "{debug}");
    }
}
