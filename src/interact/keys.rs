//! Interaction keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite identifier for one actor's interaction with one subject.
///
/// Unique within a category; the buffer treats keys as set members, not a
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractKey {
    /// Topic (or other subject) id
    pub subject: i64,
    /// User id
    pub actor: i64,
}

impl InteractKey {
    pub fn new(subject: i64, actor: i64) -> Self {
        Self { subject, actor }
    }
}

impl fmt::Display for InteractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject, self.actor)
    }
}
