//! In-memory interaction buffer
//!
//! One lane per category. A lane holds the pending `key -> desired state`
//! map together with the category's flush ticket, both behind a single
//! mutex so that a put and its ticket check, and a snapshot and its ticket
//! reset, are each indivisible. Lanes never share locks; unrelated
//! categories cannot contend.
//!
//! The lock is a `std::sync::Mutex` on purpose: nothing awaits while
//! holding it, and the ledger write always happens outside of it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Category, InteractKey};
use crate::types::{Result, TallyError};

/// Per-category buffered state.
#[derive(Default)]
struct Lane {
    /// Not-yet-flushed intent, last write wins per key
    pending: HashMap<InteractKey, bool>,
    /// Flush ticket: a flush is scheduled but has not yet snapshotted
    flush_scheduled: bool,
}

/// Write-behind buffer for interaction toggles.
///
/// Owns no persistence; a flush snapshot hands the pending map to the
/// scheduler, which applies it to the ledger.
pub struct InteractBuffer {
    lanes: [Mutex<Lane>; Category::COUNT],
}

impl InteractBuffer {
    pub fn new() -> Self {
        Self {
            lanes: std::array::from_fn(|_| Mutex::new(Lane::default())),
        }
    }

    fn lane(&self, category: Category) -> MutexGuard<'_, Lane> {
        // A poisoned lane still holds consistent data (panics cannot occur
        // mid-update below), so recover the guard instead of propagating.
        self.lanes[category.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert the desired state for `key`. Returns `true` when the lane was
    /// idle and the flush ticket was raised by this call; the caller must
    /// then arm the debounce timer. Subsequent puts in the same window
    /// return `false` and only overwrite the pending entry.
    pub fn put(&self, category: Category, key: InteractKey, state: bool) -> bool {
        let mut lane = self.lane(category);
        lane.pending.insert(key, state);
        if lane.flush_scheduled {
            false
        } else {
            lane.flush_scheduled = true;
            true
        }
    }

    /// Non-destructive lookup of buffered intent.
    pub fn peek(&self, category: Category, key: InteractKey) -> Option<bool> {
        self.lane(category).pending.get(&key).copied()
    }

    /// Snapshot-and-clear for a scheduled flush.
    ///
    /// Atomically takes the pending map and lowers the ticket, so a put
    /// racing this call either lands in the returned snapshot or in the
    /// next lane generation, never in limbo.
    ///
    /// Returns `Ok(None)` for a stale wakeup (ticket already down, lane
    /// empty) - this happens when a drain raced a scheduled timer and is
    /// harmless. A lane with pending entries but no ticket is a broken
    /// locking invariant and reported as [`TallyError::BufferFault`].
    pub fn begin_flush(&self, category: Category) -> Result<Option<HashMap<InteractKey, bool>>> {
        let mut lane = self.lane(category);
        if !lane.flush_scheduled {
            if lane.pending.is_empty() {
                return Ok(None);
            }
            return Err(TallyError::BufferFault(format!(
                "{} entries pending for '{}' with no flush scheduled",
                lane.pending.len(),
                category
            )));
        }
        lane.flush_scheduled = false;
        Ok(Some(std::mem::take(&mut lane.pending)))
    }

    /// Unconditional snapshot-and-clear, for shutdown drains. Lowers the
    /// ticket as well; a timer that was already armed will find the lane
    /// idle and no-op.
    pub fn drain(&self, category: Category) -> HashMap<InteractKey, bool> {
        let mut lane = self.lane(category);
        lane.flush_scheduled = false;
        std::mem::take(&mut lane.pending)
    }

    /// Number of buffered entries for a category.
    pub fn pending_len(&self, category: Category) -> usize {
        self.lane(category).pending.len()
    }

    /// Whether a flush is currently scheduled for a category.
    pub fn is_scheduled(&self, category: Category) -> bool {
        self.lane(category).flush_scheduled
    }
}

impl Default for InteractBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_peek() {
        let buffer = InteractBuffer::new();
        let key = InteractKey::new(7, 3);

        assert!(buffer.peek(Category::Like, key).is_none());
        buffer.put(Category::Like, key, true);
        assert_eq!(buffer.peek(Category::Like, key), Some(true));
    }

    #[test]
    fn test_last_write_wins_within_window() {
        let buffer = InteractBuffer::new();
        let key = InteractKey::new(7, 3);

        buffer.put(Category::Like, key, true);
        buffer.put(Category::Like, key, false);
        buffer.put(Category::Like, key, true);
        buffer.put(Category::Like, key, false);

        assert_eq!(buffer.peek(Category::Like, key), Some(false));
        assert_eq!(buffer.pending_len(Category::Like), 1);
    }

    #[test]
    fn test_ticket_raised_exactly_once_per_window() {
        let buffer = InteractBuffer::new();

        assert!(buffer.put(Category::Like, InteractKey::new(1, 1), true));
        assert!(!buffer.put(Category::Like, InteractKey::new(2, 2), true));
        assert!(!buffer.put(Category::Like, InteractKey::new(1, 1), false));
        assert!(buffer.is_scheduled(Category::Like));

        // The flush consumes the window; the next put opens a new one.
        let snapshot = buffer.begin_flush(Category::Like).unwrap().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(!buffer.is_scheduled(Category::Like));
        assert!(buffer.put(Category::Like, InteractKey::new(3, 3), true));
    }

    #[test]
    fn test_lanes_are_independent() {
        let buffer = InteractBuffer::new();
        let key = InteractKey::new(7, 3);

        buffer.put(Category::Like, key, true);
        buffer.put(Category::Collect, key, false);

        let likes = buffer.begin_flush(Category::Like).unwrap().unwrap();
        assert_eq!(likes.get(&key), Some(&true));
        // The collect lane is untouched by the like flush.
        assert_eq!(buffer.pending_len(Category::Collect), 1);
        assert!(buffer.is_scheduled(Category::Collect));
    }

    #[test]
    fn test_stale_wakeup_is_a_no_op() {
        let buffer = InteractBuffer::new();
        buffer.put(Category::Like, InteractKey::new(7, 3), true);

        // A drain raced the timer; the late flush finds nothing to do.
        let drained = buffer.drain(Category::Like);
        assert_eq!(drained.len(), 1);
        assert!(buffer.begin_flush(Category::Like).unwrap().is_none());
    }

    #[test]
    fn test_drain_lowers_ticket() {
        let buffer = InteractBuffer::new();
        buffer.put(Category::Collect, InteractKey::new(9, 4), true);
        assert!(buffer.is_scheduled(Category::Collect));

        buffer.drain(Category::Collect);
        assert!(!buffer.is_scheduled(Category::Collect));
        // A fresh put re-opens the window.
        assert!(buffer.put(Category::Collect, InteractKey::new(9, 4), false));
    }

    #[test]
    fn test_snapshot_is_exclusive_with_concurrent_puts() {
        use std::sync::Arc;

        let buffer = Arc::new(InteractBuffer::new());
        let writers: Vec<_> = (0..8)
            .map(|w| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        buffer.put(Category::Like, InteractKey::new(w, i), true);
                    }
                })
            })
            .collect();

        // Flush repeatedly while writers run; every put must land in
        // exactly one snapshot or survive into the final drain.
        let mut seen = 0;
        for _ in 0..50 {
            if let Some(snapshot) = buffer.begin_flush(Category::Like).unwrap() {
                seen += snapshot.len();
            }
        }
        for writer in writers {
            writer.join().unwrap();
        }
        seen += buffer.drain(Category::Like).len();
        assert_eq!(seen, 8 * 100);
    }
}
