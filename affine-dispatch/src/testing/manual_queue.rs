// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::queue::{HomeQueue, Task};

/// Simulated-time home queue.
///
/// Time starts at 0 ms and only moves through [`advance`](Self::advance).
/// Delayed tasks fire in due-time order, ties in submission order.
#[derive(Default)]
pub struct ManualQueue {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    now_millis: u64,
    next_seq: u64,
    immediate: VecDeque<Task>,
    delayed: BTreeMap<(u64, u64), Task>,
    delays_seen: Vec<u64>,
    posted: usize,
    shut_down: bool,
}

/// Identifies one delayed post on a [`ManualQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualToken {
    due_millis: u64,
    seq: u64,
}

impl ManualQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now_millis(&self) -> u64 {
        self.state().now_millis
    }

    /// Number of immediate posts accepted so far.
    pub fn posted_count(&self) -> usize {
        self.state().posted
    }

    pub fn pending_immediate(&self) -> usize {
        self.state().immediate.len()
    }

    pub fn pending_delayed(&self) -> usize {
        self.state().delayed.len()
    }

    /// Every delay, in milliseconds, handed to `post_delayed`.
    pub fn delays_seen(&self) -> Vec<u64> {
        self.state().delays_seen.clone()
    }

    /// Drop everything pending and reject all further posts.
    pub fn shut_down(&self) {
        let mut state = self.state();
        state.shut_down = true;
        state.immediate.clear();
        state.delayed.clear();
    }

    /// Run immediate tasks until none are left, including ones posted while
    /// running. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.state().immediate.pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Move time forward by `millis`, firing each delayed task that comes
    /// due on the way. Tasks run synchronously inside this call; immediate
    /// posts are left for [`run_pending`](Self::run_pending). Returns how many
    /// delayed tasks fired.
    pub fn advance(&self, millis: u64) -> usize {
        let target = self.now_millis().saturating_add(millis);
        let mut fired = 0;
        loop {
            let task = {
                let mut state = self.state();
                let next_due = state.delayed.first_key_value().map(|(&(due, _), _)| due);
                match next_due {
                    Some(due) if due <= target => {
                        state.now_millis = state.now_millis.max(due);
                        state.delayed.pop_first().map(|(_, task)| task)
                    }
                    _ => None,
                }
            };
            match task {
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => break,
            }
        }
        let mut state = self.state();
        state.now_millis = state.now_millis.max(target);
        fired
    }
}

impl HomeQueue for ManualQueue {
    type Token = ManualToken;

    fn post(&self, task: Task) -> bool {
        let mut state = self.state();
        if state.shut_down {
            return false;
        }
        state.posted += 1;
        state.immediate.push_back(task);
        true
    }

    fn post_delayed(&self, task: Task, delay_millis: u64) -> Option<ManualToken> {
        let mut state = self.state();
        if state.shut_down {
            return None;
        }
        state.delays_seen.push(delay_millis);
        let token = ManualToken {
            due_millis: state.now_millis.saturating_add(delay_millis),
            seq: state.next_seq,
        };
        state.next_seq += 1;
        state.delayed.insert((token.due_millis, token.seq), task);
        Some(token)
    }

    fn remove(&self, token: &ManualToken) {
        self.state().delayed.remove(&(token.due_millis, token.seq));
    }
}

impl fmt::Debug for ManualQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ManualQueue")
            .field("now_millis", &state.now_millis)
            .field("immediate", &state.immediate.len())
            .field("delayed", &state.delayed.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}
