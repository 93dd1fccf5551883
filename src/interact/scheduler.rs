//! Debounce scheduling and batched flushing
//!
//! Each category moves through Idle -> Scheduled -> flushing -> Idle. The
//! first put into an idle lane raises the flush ticket and arms a one-shot
//! timer here; every further put within the window only mutates the buffer.
//! When the timer fires, the category id is queued to a bounded pool of
//! flush workers. A worker snapshots the lane (which atomically lowers the
//! ticket) and applies the batch to the ledger outside the lane lock, so a
//! slow storage round trip never blocks new interactions.
//!
//! A ledger failure drops the batch: the ticket was already reset at
//! snapshot time, so the next interaction schedules a fresh flush and the
//! category can never stall. The loss is bounded by one debounce window.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use super::{Category, EngineConfig, InteractBuffer, InteractKey};
use crate::ledger::InteractLedger;
use crate::types::Result;

/// Result of one applied batch.
#[derive(Debug, Clone, Serialize)]
pub struct FlushOutcome {
    /// Keys whose rows were ensured present
    pub set: usize,
    /// Keys whose rows were ensured absent
    pub unset: usize,
}

/// Lifetime flush counters, shared with the engine's stats surface.
#[derive(Default)]
pub(crate) struct FlushCounters {
    pub flushes: AtomicU64,
    pub failures: AtomicU64,
    pub entries_flushed: AtomicU64,
}

/// Per-category debounce timers plus the flush worker pool.
pub struct FlushScheduler {
    delay: std::time::Duration,
    flush_tx: mpsc::Sender<Category>,
    counters: Arc<FlushCounters>,
}

impl FlushScheduler {
    /// Spawn the worker pool and return the scheduler handle.
    pub(crate) fn start(
        config: &EngineConfig,
        buffer: Arc<InteractBuffer>,
        ledger: Arc<dyn InteractLedger>,
    ) -> Self {
        let (flush_tx, flush_rx) = mpsc::channel::<Category>(config.flush_queue_size.max(1));
        let flush_rx = Arc::new(AsyncMutex::new(flush_rx));
        let counters = Arc::new(FlushCounters::default());

        let workers = config.flush_workers.max(1);
        for worker_id in 0..workers {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&flush_rx),
                Arc::clone(&buffer),
                Arc::clone(&ledger),
                Arc::clone(&counters),
            ));
        }

        info!(
            workers = workers,
            delay_ms = config.debounce_delay.as_millis() as u64,
            "flush scheduler started"
        );

        Self {
            delay: config.debounce_delay,
            flush_tx,
            counters,
        }
    }

    /// Arm the one-shot debounce timer for a category whose ticket was just
    /// raised. Timers are re-armed per Idle -> Scheduled transition and are
    /// not cancellable: a lone interaction still gets flushed after the
    /// delay.
    pub fn arm(&self, category: Category) {
        let flush_tx = self.flush_tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if flush_tx.send(category).await.is_err() {
                warn!(category = %category, "flush channel closed, wakeup dropped");
            }
        });
    }

    /// Apply an already-drained pending map, bypassing the timer path.
    /// Used by shutdown drains.
    pub(crate) async fn flush_pending(
        &self,
        ledger: &dyn InteractLedger,
        category: Category,
        pending: std::collections::HashMap<InteractKey, bool>,
    ) -> Result<FlushOutcome> {
        apply_pending(ledger, category, pending, &self.counters).await
    }

    pub(crate) fn counters(&self) -> &FlushCounters {
        &self.counters
    }
}

/// Worker task: pull category wakeups and run flushes until the channel
/// closes.
async fn worker_loop(
    worker_id: usize,
    flush_rx: Arc<AsyncMutex<mpsc::Receiver<Category>>>,
    buffer: Arc<InteractBuffer>,
    ledger: Arc<dyn InteractLedger>,
    counters: Arc<FlushCounters>,
) {
    debug!(worker = worker_id, "flush worker started");
    loop {
        let category = {
            let mut rx = flush_rx.lock().await;
            rx.recv().await
        };
        let Some(category) = category else {
            debug!(worker = worker_id, "flush channel closed, worker exiting");
            return;
        };

        match flush_category(&buffer, ledger.as_ref(), category, &counters).await {
            Ok(Some(outcome)) => debug!(
                worker = worker_id,
                category = %category,
                set = outcome.set,
                unset = outcome.unset,
                "flush completed"
            ),
            Ok(None) => debug!(category = %category, "stale flush wakeup, nothing to do"),
            Err(e) if e.is_fatal() => {
                // A buffer fault means the lane's locking invariant broke;
                // surface it loudly rather than limping on quietly.
                error!(category = %category, error = %e, "flush aborted by buffer fault")
            }
            Err(e) => {
                error!(category = %category, error = %e, "interaction flush failed, batch dropped")
            }
        }
    }
}

/// Snapshot a category's lane and apply the batch. `Ok(None)` means the
/// wakeup was stale and there was nothing to flush.
pub(crate) async fn flush_category(
    buffer: &InteractBuffer,
    ledger: &dyn InteractLedger,
    category: Category,
    counters: &FlushCounters,
) -> Result<Option<FlushOutcome>> {
    let Some(pending) = buffer.begin_flush(category)? else {
        return Ok(None);
    };
    apply_pending(ledger, category, pending, counters).await.map(Some)
}

async fn apply_pending(
    ledger: &dyn InteractLedger,
    category: Category,
    pending: std::collections::HashMap<InteractKey, bool>,
    counters: &FlushCounters,
) -> Result<FlushOutcome> {
    let (set_keys, unset_keys) = partition(pending);
    let entries = set_keys.len() + unset_keys.len();
    let started = Instant::now();

    match ledger.apply_batch(category, &set_keys, &unset_keys).await {
        Ok(()) => {
            counters.flushes.fetch_add(1, Ordering::Relaxed);
            counters
                .entries_flushed
                .fetch_add(entries as u64, Ordering::Relaxed);
            debug!(
                category = %category,
                set = set_keys.len(),
                unset = unset_keys.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "interaction batch flushed"
            );
            Ok(FlushOutcome {
                set: set_keys.len(),
                unset: unset_keys.len(),
            })
        }
        Err(e) => {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}

/// Split a snapshot into the keys to persist and the keys to remove.
fn partition(
    pending: std::collections::HashMap<InteractKey, bool>,
) -> (Vec<InteractKey>, Vec<InteractKey>) {
    let mut set_keys = Vec::new();
    let mut unset_keys = Vec::new();
    for (key, state) in pending {
        if state {
            set_keys.push(key);
        } else {
            unset_keys.push(key);
        }
    }
    (set_keys, unset_keys)
}
