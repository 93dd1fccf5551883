//! Read-through query resolution
//!
//! Buffered intent is newer than anything in the ledger by construction,
//! so the buffer answers first and the ledger is only consulted for keys
//! with no pending entry.

use std::sync::Arc;

use super::{Category, InteractBuffer, InteractKey};
use crate::ledger::InteractLedger;
use crate::types::Result;

/// Read path that merges buffer state with ledger state.
pub struct QueryResolver {
    buffer: Arc<InteractBuffer>,
    ledger: Arc<dyn InteractLedger>,
}

impl QueryResolver {
    pub fn new(buffer: Arc<InteractBuffer>, ledger: Arc<dyn InteractLedger>) -> Self {
        Self { buffer, ledger }
    }

    /// Is `actor` currently interacting with `subject` under `category`?
    ///
    /// Gives read-your-own-write consistency for interactions still sitting
    /// in the buffer and falls back to durable truth otherwise.
    pub async fn resolve(&self, category: Category, subject: i64, actor: i64) -> Result<bool> {
        let key = InteractKey::new(subject, actor);
        if let Some(state) = self.buffer.peek(category, key) {
            return Ok(state);
        }
        self.ledger.exists(category, subject, actor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    #[tokio::test]
    async fn test_buffered_intent_wins_over_ledger_row() {
        let buffer = Arc::new(InteractBuffer::new());
        let ledger = Arc::new(MemoryLedger::new());
        ledger
            .apply_batch(Category::Like, &[InteractKey::new(7, 3)], &[])
            .await
            .unwrap();

        let resolver = QueryResolver::new(Arc::clone(&buffer), ledger);

        // Ledger says liked, but the buffer holds a newer un-like.
        buffer.put(Category::Like, InteractKey::new(7, 3), false);
        assert!(!resolver.resolve(Category::Like, 7, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_falls_back_to_ledger_when_not_buffered() {
        let buffer = Arc::new(InteractBuffer::new());
        let ledger = Arc::new(MemoryLedger::new());
        ledger
            .apply_batch(Category::Collect, &[InteractKey::new(7, 3)], &[])
            .await
            .unwrap();

        let resolver = QueryResolver::new(buffer, ledger);

        assert!(resolver.resolve(Category::Collect, 7, 3).await.unwrap());
        assert!(!resolver.resolve(Category::Collect, 7, 4).await.unwrap());
    }
}
