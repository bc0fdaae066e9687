//! Entity types for the storyline kernel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an entity in the timeline arena.
///
/// Implements `Ord` so that every table keyed by entity iterates
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(usize);

impl EntityId {
    /// Create an id from an arena index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Row of this entity in every entity×timestamp table.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<usize> for EntityId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// An actor drawn as one storyline.
///
/// The name is a display annotation only; identity is always the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Arena index.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Categorical tag (the line colour group). Two entities with the same
    /// category may be squeezed closer together.
    pub category: Option<String>,
}

impl Entity {
    /// Create an entity without a category.
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            category: None,
        }
    }

    /// Attach a category.
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Whether both entities carry the same category.
    ///
    /// Entities without a category never share one.
    pub fn shares_category(&self, other: &Entity) -> bool {
        match (&self.category, &other.category) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
