//! Persistent interaction ledger
//!
//! The durable side of the engine: confirmed interactions keyed by
//! (category, subject, actor). The core only ever touches storage through
//! the [`InteractLedger`] trait; [`MongoLedger`] is the production backend
//! and [`MemoryLedger`] backs tests and dev deployments.

pub mod memory;
pub mod mongo;

pub use memory::{MemoryLedger, MemoryLedgerStats};
pub use mongo::MongoLedger;

use async_trait::async_trait;

use crate::interact::{Category, InteractKey};
use crate::types::Result;

/// Durable store of confirmed interactions.
///
/// `apply_batch` must be idempotent per key: the scheduler offers no
/// exactly-once delivery, so an insert of an existing row or a delete of a
/// missing row is a no-op, and overlapping batches must not error.
#[async_trait]
pub trait InteractLedger: Send + Sync {
    /// Ensure a row exists for every key in `set_keys` and no row exists
    /// for any key in `unset_keys`.
    async fn apply_batch(
        &self,
        category: Category,
        set_keys: &[InteractKey],
        unset_keys: &[InteractKey],
    ) -> Result<()>;

    /// Point lookup: is `actor` currently interacting with `subject`?
    async fn exists(&self, category: Category, subject: i64, actor: i64) -> Result<bool>;

    /// Number of actors interacting with `subject` under `category`.
    async fn count(&self, category: Category, subject: i64) -> Result<u64>;
}
