//! Egocentric network construction.
//!
//! Turns raw timestamped edges into the [`TimelineModel`](crate::types::TimelineModel)
//! the layout engine consumes. The engine never looks at raw edges.

pub mod edge;
pub mod bucket;
pub mod constraints;
pub mod builder;

pub use edge::InteractionEdge;
pub use bucket::{TimeBuckets, TimeGranularity};
pub use constraints::{derive_hops, resolve_reciprocal};
pub use builder::{GroupOverride, NetworkBuilder, NetworkError, HOP_LIMIT};
