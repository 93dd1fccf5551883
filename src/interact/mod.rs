//! Interaction buffering and batch flushing
//!
//! High-frequency, low-value interactions (like and collect toggles) are
//! absorbed into per-category in-memory buffers and coalesced into batched
//! ledger writes, so a burst of toggles costs one storage round trip
//! instead of hundreds.
//!
//! ## Components
//!
//! - [`InteractBuffer`] - per-category pending state plus the flush ticket,
//!   one mutex per category
//! - [`FlushScheduler`] - one-shot debounce timers feeding a bounded pool
//!   of flush workers
//! - [`QueryResolver`] - buffer-first, ledger-fallback reads
//! - [`InteractEngine`] - the facade services hold on to
//!
//! ## Guarantees
//!
//! - At most one flush scheduled per category at any instant
//! - A put racing a flush snapshot lands in that snapshot or the next
//!   generation, never nowhere
//! - Reads see buffered intent before durable state
//! - A failed flush drops at most one debounce window of toggles and never
//!   stalls the category

pub mod buffer;
pub mod category;
pub mod engine;
pub mod keys;
pub mod resolver;
pub mod scheduler;

pub use buffer::InteractBuffer;
pub use category::Category;
pub use engine::{EngineStats, InteractEngine};
pub use keys::InteractKey;
pub use resolver::QueryResolver;
pub use scheduler::{FlushOutcome, FlushScheduler};

use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet period between the first buffered toggle and its flush
    pub debounce_delay: Duration,
    /// Background flush worker tasks
    pub flush_workers: usize,
    /// Bound on queued flush wakeups
    pub flush_queue_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_secs(3),
            flush_workers: 2,
            flush_queue_size: 64,
        }
    }
}

impl EngineConfig {
    /// Config tuned for interactive deployments: shorter windows, so
    /// flushed counts show up quickly at the cost of smaller batches.
    pub fn for_interactive() -> Self {
        Self {
            debounce_delay: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Create config from environment or defaults
    pub fn from_env() -> Self {
        let debounce_ms = std::env::var("TALLY_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3_000);

        let flush_workers = std::env::var("TALLY_FLUSH_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        let flush_queue_size = std::env::var("TALLY_FLUSH_QUEUE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64);

        Self {
            debounce_delay: Duration::from_millis(debounce_ms),
            flush_workers,
            flush_queue_size,
        }
    }
}
