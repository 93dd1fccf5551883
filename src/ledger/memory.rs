//! In-memory ledger
//!
//! Row storage in a concurrent map, for tests and single-process dev
//! deployments where MongoDB is not running. Rows survive as long as the
//! process does.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::InteractLedger;
use crate::interact::{Category, InteractKey};
use crate::types::Result;

/// Ledger backed by a process-local concurrent map.
#[derive(Default)]
pub struct MemoryLedger {
    rows: DashMap<(Category, InteractKey), ()>,
    batches_applied: AtomicU64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for assertions and status endpoints.
    pub fn stats(&self) -> MemoryLedgerStats {
        MemoryLedgerStats {
            rows: self.rows.len(),
            batches_applied: self.batches_applied.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl InteractLedger for MemoryLedger {
    async fn apply_batch(
        &self,
        category: Category,
        set_keys: &[InteractKey],
        unset_keys: &[InteractKey],
    ) -> Result<()> {
        for key in set_keys {
            self.rows.insert((category, *key), ());
        }
        for key in unset_keys {
            self.rows.remove(&(category, *key));
        }
        self.batches_applied.fetch_add(1, Ordering::Relaxed);
        debug!(
            category = %category,
            set = set_keys.len(),
            unset = unset_keys.len(),
            "memory ledger batch applied"
        );
        Ok(())
    }

    async fn exists(&self, category: Category, subject: i64, actor: i64) -> Result<bool> {
        Ok(self
            .rows
            .contains_key(&(category, InteractKey::new(subject, actor))))
    }

    async fn count(&self, category: Category, subject: i64) -> Result<u64> {
        let count = self
            .rows
            .iter()
            .filter(|entry| {
                let (row_category, key) = entry.key();
                *row_category == category && key.subject == subject
            })
            .count();
        Ok(count as u64)
    }
}

/// Statistics about the in-memory ledger
#[derive(Debug, Clone)]
pub struct MemoryLedgerStats {
    pub rows: usize,
    pub batches_applied: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_batch_is_idempotent() {
        let ledger = MemoryLedger::new();
        let key = InteractKey::new(7, 3);

        ledger
            .apply_batch(Category::Like, &[key], &[])
            .await
            .unwrap();
        ledger
            .apply_batch(Category::Like, &[key], &[])
            .await
            .unwrap();
        assert_eq!(ledger.stats().rows, 1);

        ledger
            .apply_batch(Category::Like, &[], &[key])
            .await
            .unwrap();
        ledger
            .apply_batch(Category::Like, &[], &[key])
            .await
            .unwrap();
        assert_eq!(ledger.stats().rows, 0);
        assert_eq!(ledger.stats().batches_applied, 4);
    }

    #[tokio::test]
    async fn test_exists_and_count() {
        let ledger = MemoryLedger::new();

        ledger
            .apply_batch(
                Category::Collect,
                &[InteractKey::new(7, 3), InteractKey::new(7, 4)],
                &[],
            )
            .await
            .unwrap();
        ledger
            .apply_batch(Category::Like, &[InteractKey::new(7, 3)], &[])
            .await
            .unwrap();

        assert!(ledger.exists(Category::Collect, 7, 3).await.unwrap());
        assert!(!ledger.exists(Category::Collect, 8, 3).await.unwrap());
        assert_eq!(ledger.count(Category::Collect, 7).await.unwrap(), 2);
        // The like row for the same subject is not counted under collect.
        assert_eq!(ledger.count(Category::Like, 7).await.unwrap(), 1);
    }
}
