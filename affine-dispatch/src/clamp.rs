// SPDX-License-Identifier: MIT
//

use std::time::Duration;

/// Largest delay, in milliseconds, ever handed to a home queue.
///
/// Queues usually turn a relative delay into an absolute deadline by adding
/// it to a signed millisecond uptime clock. Half the signed range leaves room
/// for that addition for as long as the uptime itself stays below the other
/// half.
pub const MAX_DELAY_MILLIS: u64 = (i64::MAX / 2) as u64;

/// [`MAX_DELAY_MILLIS`] as a [`Duration`].
pub const MAX_DELAY: Duration = Duration::from_millis(MAX_DELAY_MILLIS);

const NANOS_PER_MILLI: u128 = 1_000_000;

/// Bound `delay` by [`MAX_DELAY`].
pub fn clamp_delay(delay: Duration) -> Duration {
    delay.min(MAX_DELAY)
}

/// Clamp `delay` and express it in the queue's native unit.
///
/// Sub-millisecond remainders round up, so a callback never fires before
/// the requested delay has fully elapsed.
pub fn delay_millis(delay: Duration) -> u64 {
    let millis = clamp_delay(delay).as_nanos().div_ceil(NANOS_PER_MILLI);
    // rounding up may step one past the ceiling
    millis.min(MAX_DELAY_MILLIS as u128) as u64
}
