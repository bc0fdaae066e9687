//! # storyline-kernel
//!
//! Deterministic storyline layouts for egocentric dynamic networks.
//!
//! The kernel answers one question:
//!
//! > Given who interacted with the ego and when, where should every line be
//! > drawn so the picture has few crossings, few wiggles and little height?
//!
//! ## Core Contract
//!
//! 1. Build a [`TimelineModel`] (entity×timestamp sessions) from raw edges
//! 2. Run the three layout stages under a [`LayoutPolicyV1`]
//! 3. Export a [`StorylineLayout`] with a **layout fingerprint** for replay
//!
//! ## Architecture
//!
//! ```text
//! edges → NetworkBuilder → TimelineModel → Ordering → Alignment → Compaction
//!                                                                     ↓
//!                                                              StorylineLayout
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same model + same policy → identical tables and `layout_id`
//! - Every map the stages iterate is ordered (`BTreeMap`/`BTreeSet`)
//! - Heights are quantized before fingerprinting
//! - The ego is a straight line in every layout the engine returns

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod policy;
pub mod network;
pub mod order;
pub mod align;
pub mod compact;
pub mod engine;
pub mod canonical;

// Re-exports
pub use types::{
    AlignmentTable, Entity, EntityId, Grid, GridShapeError, HeightTable, HopBucket, HopPartition,
    LayoutFingerprint, Link, ModelError, OrderTable, OrderedTimeline, Presence, Session,
    SessionAlignment, SessionId, SessionKind, SideTable, SlotTable, StorylineLayout,
    TimelineModel, WeightGroup,
};
pub use policy::{CompactionThresholds, LayoutPolicyV1, Minimize, SpacingRules};
pub use network::{
    GroupOverride, InteractionEdge, NetworkBuilder, NetworkError, TimeBuckets, TimeGranularity,
};
pub use order::{count_crossings, ordering};
pub use align::{aligning, monotonic_matching};
pub use compact::{compacting, Compaction};
pub use engine::{LayoutError, StorylineEngine};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

/// Schema version of [`StorylineLayout`].
pub const STORYLINE_SCHEMA_VERSION: &str = "1.0.0";

/// Default layout policy version.
pub const DEFAULT_POLICY_VERSION: &str = "layout_policy_v1";
