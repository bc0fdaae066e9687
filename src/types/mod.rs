//! Core types for the storyline kernel.

pub mod grid;
pub mod entity;
pub mod session;
pub mod timeline;
pub mod layout;

pub use grid::{Grid, GridShapeError};
pub use entity::{Entity, EntityId};
pub use session::{HopBucket, HopPartition, Link, Session, SessionId, SessionKind, WeightGroup};
pub use timeline::{ModelError, Presence, TimelineModel};
pub use layout::{
    AlignmentTable, HeightTable, LayoutFingerprint, OrderTable, OrderedTimeline,
    SessionAlignment, SideTable, SlotTable, StorylineLayout,
};
