//! Tally - write-behind interaction engine for the Agora forum backend
//!
//! Forum interactions like "like" and "collect" arrive far faster than a
//! relational store wants to absorb them, and most of them are toggles
//! that cancel each other out within seconds. Tally buffers that churn in
//! memory, coalesces it per category over a debounce window, and applies
//! the surviving intent to the durable ledger in idempotent batches -
//! while point-in-time queries keep seeing the freshest state.
//!
//! ## Components
//!
//! - **Interact**: buffering, debounce scheduling, batched flushing, and
//!   read-through queries ([`interact`])
//! - **Ledger**: the durable store boundary, with MongoDB and in-memory
//!   backends ([`ledger`])
//! - **Cache**: fixed-TTL page cache for topic listings ([`cache`])

pub mod cache;
pub mod interact;
pub mod ledger;
pub mod types;

pub use interact::{Category, EngineConfig, EngineStats, InteractEngine, InteractKey};
pub use ledger::{InteractLedger, MemoryLedger, MongoLedger};
pub use types::{Result, TallyError};
