//! MongoDB ledger backend
//!
//! One document per confirmed interaction, with a unique compound index on
//! (category, subject, actor) so batch application stays idempotent even
//! under overlapping flushes.

use async_trait::async_trait;
use bson::{doc, DateTime};
use mongodb::{
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::InteractLedger;
use crate::interact::{Category, InteractKey};
use crate::types::{Result, TallyError};

const COLLECTION_NAME: &str = "interactions";

/// Persisted interaction row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractRow {
    pub category: Category,
    pub subject: i64,
    pub actor: i64,
    /// When the row was first inserted
    pub time: DateTime,
}

/// Ledger backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoLedger {
    collection: Collection<InteractRow>,
}

impl MongoLedger {
    /// Connect, verify the server is reachable, and ensure the uniqueness
    /// index exists.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Bound server selection so an unreachable MongoDB fails fast
        // instead of hanging engine startup.
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| TallyError::Ledger(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| TallyError::Ledger(format!("MongoDB ping failed: {}", e)))?;

        let collection = client
            .database(db_name)
            .collection::<InteractRow>(COLLECTION_NAME);

        let index = IndexModel::builder()
            .keys(doc! { "category": 1, "subject": 1, "actor": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection
            .create_indexes(vec![index])
            .await
            .map_err(|e| TallyError::Ledger(format!("Failed to create indexes: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self { collection })
    }

    fn key_filter(category: Category, subject: i64, actor: i64) -> bson::Document {
        doc! {
            "category": category.as_str(),
            "subject": subject,
            "actor": actor,
        }
    }
}

#[async_trait]
impl InteractLedger for MongoLedger {
    async fn apply_batch(
        &self,
        category: Category,
        set_keys: &[InteractKey],
        unset_keys: &[InteractKey],
    ) -> Result<()> {
        // Insert-if-absent: the filter carries the full key, so upsert
        // either creates the row or leaves the existing one untouched.
        for key in set_keys {
            let filter = Self::key_filter(category, key.subject, key.actor);
            let update = doc! { "$setOnInsert": { "time": DateTime::now() } };
            self.collection.update_one(filter, update).upsert(true).await?;
        }

        // Delete-if-present: deleting a missing row is a no-op.
        for key in unset_keys {
            let filter = Self::key_filter(category, key.subject, key.actor);
            self.collection.delete_one(filter).await?;
        }

        debug!(
            category = %category,
            set = set_keys.len(),
            unset = unset_keys.len(),
            "ledger batch applied"
        );
        Ok(())
    }

    async fn exists(&self, category: Category, subject: i64, actor: i64) -> Result<bool> {
        let row = self
            .collection
            .find_one(Self::key_filter(category, subject, actor))
            .await?;
        Ok(row.is_some())
    }

    async fn count(&self, category: Category, subject: i64) -> Result<u64> {
        let count = self
            .collection
            .count_documents(doc! {
                "category": category.as_str(),
                "subject": subject,
            })
            .await?;
        Ok(count)
    }
}
