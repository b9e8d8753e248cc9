//! Diagnostic channel for in-page handlers.
//!
//! Handlers never propagate failures to a caller, so whatever they would have
//! reported lands here. Every entry is also forwarded to `tracing`.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// The handlers only ever report failures.
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConsoleEntry {
    pub level: Level,
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct Console {
    entries: Arc<Mutex<Vec<ConsoleEntry>>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(event = "console.error", message = %message);
        self.push(Level::Error, message);
    }

    pub fn entries(&self) -> Vec<ConsoleEntry> {
        self.lock().clone()
    }

    pub fn errors(&self) -> Vec<ConsoleEntry> {
        self.lock()
            .iter()
            .filter(|e| e.level == Level::Error)
            .cloned()
            .collect()
    }

    fn push(&self, level: Level, message: String) {
        self.lock().push(ConsoleEntry { level, message });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConsoleEntry>> {
        // Entries are plain data; a panic elsewhere cannot leave them torn.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
