// SPDX-License-Identifier: MIT
//

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use affine_dispatch::{HomeQueue, Task};
use async_channel::{Receiver, Sender};
use async_io::Timer;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{AbortHandle, Abortable};
use futures::task::LocalSpawnExt;
use log::{debug, error, info, trace, warn};

use crate::config::LooperConfig;

enum Message {
    Run(Task),
    Delayed {
        id: u64,
        task: Task,
        /// `None` when the deadline is past what `Instant` can represent.
        deadline: Option<Instant>,
        cancelled: Arc<AtomicBool>,
    },
    Remove(u64),
}

/// Identifies one delayed post on a [`Looper`].
#[derive(Debug, Clone)]
pub struct LooperToken {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

/// A thread that runs everything posted to it.
///
/// Share it as `Arc<Looper>`; that allocation is the queue identity seen by
/// dispatchers.
pub struct Looper {
    name: String,
    tx: Sender<Message>,
    thread_id: ThreadId,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Looper {
    /// Start the home thread.
    pub fn spawn(config: &LooperConfig) -> io::Result<Arc<Self>> {
        let (tx, rx) = async_channel::unbounded();
        let name = config.name.clone();

        let loop_name = name.clone();
        let thread_handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let mut pool = LocalPool::new();
            let spawner = pool.spawner();
            if let Err(e) = spawner.spawn_local(home_loop(loop_name.clone(), spawner.clone(), rx)) {
                error!("Looper {loop_name}: failed to start: {e}");
                return;
            }
            pool.run(); // blocks until the loop and all timers are done
        })?;

        info!("Started looper {name}");
        Ok(Arc::new(Self {
            name,
            tx,
            thread_id: thread_handle.thread().id(),
            thread_handle: Mutex::new(Some(thread_handle)),
            next_id: AtomicU64::new(0),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_home_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn is_quitting(&self) -> bool {
        self.tx.is_closed()
    }

    /// Stop accepting messages. Messages already queued still run; pending
    /// timers are dropped.
    pub fn quit(&self) {
        if self.tx.close() {
            debug!("Looper {}: closed for new messages", self.name);
        }
    }

    /// Quit and wait for the home thread to exit.
    pub fn wait_until_finished(&self) -> anyhow::Result<()> {
        self.quit();
        if self.is_home_thread() {
            anyhow::bail!("looper {} cannot wait for itself", self.name);
        }
        let handle = self
            .thread_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow::anyhow!("looper {} panicked", self.name)),
            None => Ok(()),
        }
    }

    fn send(&self, message: Message) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                trace!("Looper {}: dropped message: {e}", self.name);
                false
            }
        }
    }
}

impl HomeQueue for Looper {
    type Token = LooperToken;

    fn post(&self, task: Task) -> bool {
        self.send(Message::Run(task))
    }

    fn post_delayed(&self, task: Task, delay_millis: u64) -> Option<LooperToken> {
        let token = LooperToken {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let message = Message::Delayed {
            id: token.id,
            task,
            deadline: Instant::now().checked_add(Duration::from_millis(delay_millis)),
            cancelled: token.cancelled.clone(),
        };
        self.send(message).then_some(token)
    }

    fn remove(&self, token: &LooperToken) {
        // the flag decides; the message only frees the timer early
        if !token.cancelled.swap(true, Ordering::AcqRel) {
            self.send(Message::Remove(token.id));
        }
    }
}

impl fmt::Debug for Looper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Looper")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .field("quitting", &self.is_quitting())
            .finish()
    }
}

type Timers = Rc<RefCell<HashMap<u64, AbortHandle>>>;

/// Runs on the home thread: executes posted tasks and arms timers.
async fn home_loop(name: String, spawner: LocalSpawner, rx: Receiver<Message>) {
    let timers: Timers = Rc::new(RefCell::new(HashMap::new()));

    while let Ok(message) = rx.recv().await {
        match message {
            Message::Run(task) => task(),
            Message::Delayed {
                id,
                task,
                deadline,
                cancelled,
            } => {
                let (abort_handle, registration) = AbortHandle::new_pair();
                timers.borrow_mut().insert(id, abort_handle);
                let timer = Abortable::new(fire_after(id, deadline, task, cancelled, timers.clone()), registration);
                if let Err(e) = spawner.spawn_local(async move {
                    let _ = timer.await;
                }) {
                    warn!("Looper {name}: failed to arm timer {id}: {e}");
                    timers.borrow_mut().remove(&id);
                }
            }
            Message::Remove(id) => {
                if let Some(abort_handle) = timers.borrow_mut().remove(&id) {
                    abort_handle.abort();
                }
            }
        }
    }

    let pending: Vec<AbortHandle> = timers.borrow_mut().drain().map(|(_, h)| h).collect();
    if !pending.is_empty() {
        debug!("Looper {name}: dropping {} pending timers", pending.len());
    }
    for abort_handle in pending {
        abort_handle.abort();
    }
    info!("Looper {name} shutting down gracefully");
}

async fn fire_after(id: u64, deadline: Option<Instant>, task: Task, cancelled: Arc<AtomicBool>, timers: Timers) {
    // the deadline was fixed by the sender, however long the home thread was busy
    match deadline {
        Some(deadline) => Timer::at(deadline).await,
        None => Timer::never().await,
    };
    timers.borrow_mut().remove(&id);
    if !cancelled.load(Ordering::Acquire) {
        task();
    }
}
