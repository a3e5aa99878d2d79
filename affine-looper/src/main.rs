// SPDX-License-Identifier: MIT
// looper-demo: drive a home-thread dispatcher from the command line
//
// - Spawns a looper thread with a ticker clock.
// - Dispatches a task, sleeps on the home thread, waits for frames.
// - Schedules a timeout and optionally cancels it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use affine_dispatch::{as_dispatcher, AffineDispatcher, AffineDispatcherExt, DisposableHandle};
use affine_looper::{Looper, LooperConfig, TickerClockSource};
use clap::Parser;
use futures::executor::block_on;
use log::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Name of the home thread
    #[arg(long)]
    name: Option<String>,

    /// Ticker period in milliseconds
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Looper configuration (JSON encoded). Note that this excludes --name and --frame-interval-ms.
    #[arg(long, value_name = "JSON")]
    config: Option<String>,

    /// Number of frames to wait for
    #[arg(long, default_value_t = 3)]
    frames: u32,

    /// Delay to sleep on the home thread, in milliseconds
    #[arg(long, default_value_t = 250)]
    delay_ms: u64,

    /// Timeout to schedule, in milliseconds
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,

    /// Dispose the timeout right after scheduling it
    #[arg(long)]
    cancel_timeout: bool,
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.config.is_some() && (args.name.is_some() || args.frame_interval_ms.is_some()) {
        return Err("--config must not be used in combination with --name or --frame-interval-ms".into());
    }

    if args.frame_interval_ms == Some(0) {
        return Err("--frame-interval-ms must be at least 1".into());
    }

    Ok(())
}

fn looper_config(args: &Args) -> anyhow::Result<LooperConfig> {
    let config = match &args.config {
        Some(json) => LooperConfig::from_json(json)?,
        None => {
            let mut config = LooperConfig::default();
            if let Some(name) = &args.name {
                config.name = name.clone();
            }
            if let Some(interval) = args.frame_interval_ms {
                config.frame_interval_ms = interval;
            }
            config
        }
    };
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }
    let config = looper_config(&args)?;

    let looper = Looper::spawn(&config)?;
    let clock_source = TickerClockSource::new(&looper, config.frame_interval());
    let dispatcher = as_dispatcher(looper.clone(), clock_source, Some(config.name.as_str()));

    let home = looper.clone();
    dispatcher.dispatch(Box::new(move || {
        info!("Dispatched task running on home thread: {}", home.is_home_thread());
    }));

    let start = Instant::now();
    block_on(dispatcher.delay(Duration::from_millis(args.delay_ms)));
    info!("Resumed after {:?} (asked for {}ms)", start.elapsed(), args.delay_ms);

    let fired = Arc::new(AtomicBool::new(false));
    let fired_flag = fired.clone();
    let timeout = dispatcher.invoke_on_timeout(
        Duration::from_millis(args.timeout_ms),
        Box::new(move || {
            fired_flag.store(true, Ordering::Release);
            info!("Timeout fired");
        }),
    );
    if args.cancel_timeout {
        timeout.dispose();
        info!("Timeout disposed");
    }

    for frame in 0..args.frames {
        let timestamp = block_on(dispatcher.await_frame());
        info!("Frame {frame} at {timestamp}ns");
    }

    // give the timeout a chance to fire before shutting down
    block_on(dispatcher.delay(Duration::from_millis(args.timeout_ms + config.frame_interval_ms)));
    info!(
        "Timeout {}",
        if fired.load(Ordering::Acquire) { "ran" } else { "did not run" }
    );

    info!("Stopping {dispatcher}");
    looper.wait_until_finished()?;

    Ok(())
}
