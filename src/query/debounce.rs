//! Keystroke debouncing
//!
//! Each keystroke arms a new generation. A keystroke's query runs only if
//! no newer keystroke arrived during the quiet period.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Debouncer {
    generation: Arc<AtomicU64>,
    quiet: Duration,
}

/// Handle for one armed keystroke
#[derive(Debug)]
pub struct DebounceTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
    quiet: Duration,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            quiet,
        }
    }

    /// Start a new generation, superseding every outstanding ticket
    pub fn arm(&self) -> DebounceTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        DebounceTicket {
            generation,
            latest: self.generation.clone(),
            quiet: self.quiet,
        }
    }
}

impl DebounceTicket {
    /// True while no newer generation has been armed
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    /// Wait out the quiet period; true if this keystroke should query
    pub async fn settle(self) -> bool {
        tokio::time::sleep(self.quiet).await;
        self.is_current()
    }
}
