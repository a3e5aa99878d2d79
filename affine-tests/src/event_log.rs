// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggedEvent {
    pub label: String,

    pub on_home_thread: bool,

    pub elapsed_micros: u64,

    pub value: Option<u64>,
}

/// Events recorded from any thread, dumped as JSON when an assertion needs
/// context.
#[derive(Debug)]
pub struct EventLog {
    start: Instant,
    events: Mutex<Vec<LoggedEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn record(&self, label: impl Into<String>, on_home_thread: bool, value: Option<u64>) {
        let event = LoggedEvent {
            label: label.into(),
            on_home_thread,
            elapsed_micros: self.start.elapsed().as_micros() as u64,
            value,
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.label).collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events().iter().filter(|e| e.label == label).count()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.events()).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }
}
