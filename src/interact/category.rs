//! Interaction categories
//!
//! Every buffer lane, flush ticket, and ledger row is partitioned by
//! category. Categories never share locks or timers, so adding a variant
//! here is all it takes to buffer a new kind of interaction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::TallyError;

/// A recognized interaction category.
///
/// Unknown tags are rejected at the boundary (`FromStr`) before they can
/// reach buffer or scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Thumbs-up on a topic
    Like,
    /// Topic saved to the user's favorites
    Collect,
}

impl Category {
    /// All recognized categories, in lane order.
    pub const ALL: [Category; 2] = [Category::Like, Category::Collect];

    /// Number of categories (= number of buffer lanes).
    pub const COUNT: usize = Self::ALL.len();

    /// Wire/storage tag for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Like => "like",
            Category::Collect => "collect",
        }
    }

    /// Lane index for per-category state arrays.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Category::Like),
            "collect" => Ok(Category::Collect),
            other => Err(TallyError::InvalidCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!("like".parse::<Category>().unwrap(), Category::Like);
        assert_eq!("collect".parse::<Category>().unwrap(), Category::Collect);
    }

    #[test]
    fn test_reject_unknown_tag() {
        let err = "upvote".parse::<Category>().unwrap_err();
        assert!(matches!(err, TallyError::InvalidCategory(tag) if tag == "upvote"));
    }

    #[test]
    fn test_display_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_lane_indices_are_distinct() {
        assert_eq!(Category::Like.index(), 0);
        assert_eq!(Category::Collect.index(), 1);
    }
}
