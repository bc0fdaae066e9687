//! Raw timestamped interactions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One directed, weighted interaction observed at a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEdge {
    /// Name of the source entity.
    pub source: String,
    /// Name of the target entity.
    pub target: String,
    /// Observation date.
    pub time: NaiveDate,
    /// Interaction weight.
    pub weight: u32,
}

impl InteractionEdge {
    /// Create an edge.
    pub fn new(source: impl Into<String>, target: impl Into<String>, time: NaiveDate, weight: u32) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            time,
            weight,
        }
    }

    /// Whether `name` is one of the endpoints.
    pub fn touches(&self, name: &str) -> bool {
        self.source == name || self.target == name
    }

    /// The endpoint opposite to `name`, if `name` is an endpoint.
    pub fn other(&self, name: &str) -> Option<&str> {
        if self.source == name {
            Some(&self.target)
        } else if self.target == name {
            Some(&self.source)
        } else {
            None
        }
    }

    /// Whether source and target coincide.
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}
