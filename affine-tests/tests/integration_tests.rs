// SPDX-License-Identifier: MIT
//

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use affine_dispatch::{AffineDispatcher, AffineDispatcherExt, DisposableHandle, HomeDispatcher};
use affine_tests::event_log::EventLog;
use affine_tests::harness::spawn_home;
use futures::executor::block_on;

const FRAME: Duration = Duration::from_millis(5);
const PATIENCE: Duration = Duration::from_secs(5);

#[test]
fn test_concurrent_dispatch_runs_once_on_home_thread() {
    let home = spawn_home("dispatch", FRAME);
    let log = EventLog::new();
    let barrier = Arc::new(Barrier::new(4));

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let dispatcher = home.dispatcher.clone();
            let looper = home.looper.clone();
            let log = log.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..100 {
                    let log = log.clone();
                    let looper = looper.clone();
                    dispatcher.dispatch(Box::new(move || {
                        log.record(format!("{p}-{i}"), looper.is_home_thread(), None)
                    }));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    home.looper.wait_until_finished().unwrap();

    let events = log.events();
    assert_eq!(events.len(), 400);
    assert!(events.iter().all(|e| e.on_home_thread), "{}", log.to_json());
    let unique: HashSet<_> = events.iter().map(|e| e.label.clone()).collect();
    assert_eq!(unique.len(), 400);

    // each producer keeps its own order
    for p in 0..4 {
        let prefix = format!("{p}-");
        let mine: Vec<String> = log.labels().into_iter().filter(|l| l.starts_with(&prefix)).collect();
        assert_eq!(mine, (0..100).map(|i| format!("{p}-{i}")).collect::<Vec<_>>());
    }
}

#[test]
fn test_resume_after_delay_on_home_thread() {
    let home = spawn_home("delay", FRAME);
    let (tx, rx) = mpsc::channel();

    let looper = home.looper.clone();
    let start = Instant::now();
    home.dispatcher.schedule_resume_after_delay(
        Duration::from_millis(40),
        Box::new(move |()| tx.send((Instant::now(), looper.is_home_thread())).unwrap()),
    );

    let (resumed_at, on_home) = rx.recv_timeout(PATIENCE).expect("never resumed");
    assert!(resumed_at.duration_since(start) >= Duration::from_millis(40));
    assert!(on_home);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err(), "resumed twice");
}

#[test]
fn test_delay_future_from_another_thread() {
    let home = spawn_home("delay-future", FRAME);

    let start = Instant::now();
    block_on(home.dispatcher.delay(Duration::from_millis(30)));
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[test]
fn test_disposed_timeout_never_runs() {
    let home = spawn_home("timeout", FRAME);
    let ran = Arc::new(AtomicUsize::new(0));

    let r = ran.clone();
    let handle = home.dispatcher.invoke_on_timeout(
        Duration::from_millis(50),
        Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }),
    );
    handle.dispose();
    handle.dispose();

    block_on(home.dispatcher.delay(Duration::from_millis(120)));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dispose_after_fire_is_noop() {
    let home = spawn_home("timeout-fired", FRAME);
    let (tx, rx) = mpsc::channel();

    let handle = home
        .dispatcher
        .invoke_on_timeout(Duration::from_millis(10), Box::new(move || tx.send(()).unwrap()));
    rx.recv_timeout(PATIENCE).expect("timeout never fired");

    handle.dispose();
    handle.dispose();
    assert!(handle.is_disposed());
}

#[test]
fn test_max_timeout_does_not_block_shutdown() {
    let home = spawn_home("timeout-max", FRAME);
    let ran = Arc::new(AtomicUsize::new(0));

    let r = ran.clone();
    let _handle = home.dispatcher.invoke_on_timeout(
        Duration::MAX,
        Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }),
    );
    // make sure the timer is armed before quitting
    block_on(home.dispatcher.delay(Duration::from_millis(10)));

    let start = Instant::now();
    home.looper.wait_until_finished().unwrap();
    assert!(start.elapsed() < PATIENCE);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_frames_strictly_increase() {
    let home = spawn_home("frames", FRAME);

    let t1 = block_on(home.dispatcher.await_frame());
    let t2 = block_on(home.dispatcher.await_frame());
    let t3 = block_on(home.dispatcher.await_frame());

    assert!(t1 < t2 && t2 < t3, "{t1} {t2} {t3}");
    assert_eq!(home.source.resolutions(), 1);
    assert!(home.dispatcher.is_clock_resolved());
}

#[test]
fn test_concurrent_first_frames_resolve_clock_once() {
    let home = spawn_home("frames-race", FRAME);
    let barrier = Arc::new(Barrier::new(8));

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let dispatcher = home.dispatcher.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                block_on(dispatcher.await_frame())
            })
        })
        .collect();
    let stamps: Vec<u64> = waiters.into_iter().map(|w| w.join().unwrap()).collect();

    assert_eq!(stamps.len(), 8);
    assert_eq!(home.source.resolutions(), 1);
}

#[test]
fn test_frame_loop_on_home_thread() {
    let home = spawn_home("frame-loop", FRAME);
    let log = EventLog::new();
    let (tx, rx) = mpsc::channel();

    fn next(dispatcher: HomeDispatcher<affine_looper::Looper>, log: Arc<EventLog>, left: u32, done: mpsc::Sender<()>) {
        let again = dispatcher.clone();
        let looper = dispatcher.queue().clone();
        dispatcher.post_frame_resume(Box::new(move |timestamp: u64| {
            log.record("frame", looper.is_home_thread(), Some(timestamp));
            if left > 1 {
                next(again, log, left - 1, done);
            } else {
                done.send(()).unwrap();
            }
        }));
    }
    next(home.dispatcher.clone(), log.clone(), 4, tx);
    rx.recv_timeout(PATIENCE).expect("frame loop stalled");

    let events = log.events();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.on_home_thread), "{}", log.to_json());
    let stamps: Vec<u64> = events.iter().filter_map(|e| e.value).collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]), "{}", log.to_json());
}

#[test]
fn test_dispatchers_over_same_looper_are_interchangeable() {
    let home = spawn_home("identity", FRAME);
    let other = spawn_home("identity-other", FRAME);

    let twin = HomeDispatcher::new(home.looper.clone(), home.source.clone());
    let main = HomeDispatcher::main(home.looper.clone(), home.source.clone());

    assert_eq!(home.dispatcher, twin);
    assert_eq!(twin, main);
    assert_ne!(home.dispatcher, other.dispatcher);

    let set: HashSet<_> = [home.dispatcher.clone(), twin, main, other.dispatcher.clone()]
        .into_iter()
        .collect();
    assert_eq!(set.len(), 2);
    assert_eq!(home.dispatcher.to_string(), "identity");
}

#[test]
fn test_dispatch_after_quit_is_silent() {
    let home = spawn_home("quit", FRAME);
    home.looper.wait_until_finished().unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let r = ran.clone();
    home.dispatcher.dispatch(Box::new(move || {
        r.fetch_add(1, Ordering::SeqCst);
    }));
    let handle = home.dispatcher.invoke_on_timeout(Duration::ZERO, Box::new(|| {}));
    handle.dispose();

    thread::sleep(Duration::from_millis(20));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}
