//! Engine facade
//!
//! A single long-lived instance owns all buffering state; callers hold an
//! `Arc` to it. No ambient globals.

use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    Category, EngineConfig, FlushScheduler, InteractBuffer, InteractKey, QueryResolver,
};
use crate::ledger::InteractLedger;
use crate::types::Result;

/// Write-behind interaction engine.
///
/// Absorbs like/collect toggles into per-category buffers, coalesces them
/// over a debounce window, and applies them to the ledger in batches.
pub struct InteractEngine {
    buffer: Arc<InteractBuffer>,
    ledger: Arc<dyn InteractLedger>,
    resolver: QueryResolver,
    scheduler: FlushScheduler,
}

impl InteractEngine {
    /// Build the engine and start its flush workers.
    ///
    /// Must run inside a tokio runtime; worker and timer tasks are spawned
    /// on it.
    pub fn new(config: EngineConfig, ledger: Arc<dyn InteractLedger>) -> Self {
        let buffer = Arc::new(InteractBuffer::new());
        let scheduler = FlushScheduler::start(&config, Arc::clone(&buffer), Arc::clone(&ledger));
        let resolver = QueryResolver::new(Arc::clone(&buffer), Arc::clone(&ledger));

        info!(
            categories = Category::COUNT,
            delay_ms = config.debounce_delay.as_millis() as u64,
            "interaction engine started"
        );

        Self {
            buffer,
            ledger,
            resolver,
            scheduler,
        }
    }

    /// Record a desired interaction state, fire-and-forget.
    ///
    /// The write lands in the buffer immediately and reaches the ledger
    /// after the debounce window; ledger failures never surface here.
    pub fn record(&self, category: Category, subject: i64, actor: i64, state: bool) {
        let key = InteractKey::new(subject, actor);
        if self.buffer.put(category, key, state) {
            self.scheduler.arm(category);
        }
    }

    /// Is `actor` currently interacting with `subject`?
    ///
    /// Buffered intent wins; otherwise the ledger answers.
    pub async fn query(&self, category: Category, subject: i64, actor: i64) -> Result<bool> {
        self.resolver.resolve(category, subject, actor).await
    }

    /// Durable interaction count for a subject (buffered toggles are not
    /// counted until flushed).
    pub async fn count(&self, category: Category, subject: i64) -> Result<u64> {
        self.ledger.count(category, subject).await
    }

    /// Flush every category immediately, bypassing the debounce timers.
    /// For graceful shutdown. Attempts all categories even if one fails
    /// and returns the first error.
    pub async fn drain(&self) -> Result<()> {
        let mut first_err = None;
        for category in Category::ALL {
            let pending = self.buffer.drain(category);
            if pending.is_empty() {
                continue;
            }
            if let Err(e) = self
                .scheduler
                .flush_pending(self.ledger.as_ref(), category, pending)
                .await
            {
                warn!(category = %category, error = %e, "drain flush failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Current engine counters.
    pub fn stats(&self) -> EngineStats {
        let counters = self.scheduler.counters();
        let mut pending = 0;
        let mut scheduled = 0;
        for category in Category::ALL {
            pending += self.buffer.pending_len(category);
            if self.buffer.is_scheduled(category) {
                scheduled += 1;
            }
        }
        EngineStats {
            pending,
            scheduled,
            flushes: counters.flushes.load(Ordering::Relaxed),
            flush_failures: counters.failures.load(Ordering::Relaxed),
            entries_flushed: counters.entries_flushed.load(Ordering::Relaxed),
        }
    }
}

/// Engine counters for status endpoints and tests.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Buffered entries across all categories
    pub pending: usize,
    /// Categories with a flush currently scheduled
    pub scheduled: usize,
    /// Successful flushes since startup
    pub flushes: u64,
    /// Flushes that failed and dropped their batch
    pub flush_failures: u64,
    /// Entries applied to the ledger since startup
    pub entries_flushed: u64,
}
