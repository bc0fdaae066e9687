//! Layout policy definitions.

pub mod v1;
pub mod spacing;

pub use v1::{CompactionThresholds, LayoutPolicyV1, Minimize, SpacingRules};
pub use spacing::{min_distance, IdentityRelation, PairContext};
