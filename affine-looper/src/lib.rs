// SPDX-License-Identifier: MIT
//

pub mod config;
pub mod looper;
pub mod ticker;

pub use crate::config::LooperConfig;
pub use crate::looper::{Looper, LooperToken};
pub use crate::ticker::{TickerClock, TickerClockSource};
