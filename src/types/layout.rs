//! Stage outputs and the final storyline layout bundle.
//!
//! ## Determinism
//!
//! Every table is keyed by the model's entity and timestamp indices and
//! every map is a `BTreeMap`, so serialising a layout twice yields the same
//! bytes. The layout fingerprint hashes heights after quantisation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entity::EntityId;
use super::grid::Grid;
use super::session::SessionId;
use crate::canonical::{canonical_hash_hex, quantize_f64};
use crate::STORYLINE_SCHEMA_VERSION;

/// Entity×timestamp 1-based rank, `None` when absent.
pub type OrderTable = Grid<Option<u32>>;

/// Entity×timestamp vertical coordinate, `None` when absent.
pub type HeightTable = Grid<Option<f64>>;

/// Result of the ordering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedTimeline {
    /// Rank of every entity at every timestamp.
    pub orders: OrderTable,
    /// Present entities per timestamp, sorted by rank.
    pub entities: Vec<Vec<EntityId>>,
    /// The idle subsequence of `entities` per timestamp.
    pub idle: Vec<Vec<EntityId>>,
    /// Sessions per timestamp, top to bottom.
    pub sessions: Vec<Vec<SessionId>>,
}

impl OrderedTimeline {
    /// Number of timestamps covered.
    pub fn num_timestamps(&self) -> usize {
        self.entities.len()
    }

    /// Position (0-based) of `entity` in the ordered sequence at `timestamp`.
    pub fn position(&self, entity: EntityId, timestamp: usize) -> Option<usize> {
        self.entities[timestamp].iter().position(|&e| e == entity)
    }

    /// Rank of `entity` at `timestamp`.
    pub fn rank(&self, entity: EntityId, timestamp: usize) -> Option<u32> {
        *self.orders.get(entity.index(), timestamp)
    }
}

/// Result of the entity-level alignment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentTable {
    /// Per adjacent pair `(t, t+1)`: matched positions, ascending on both sides.
    pub pairs: Vec<Vec<(usize, usize)>>,
    /// Entity at `t` (row) to the entity it is aligned with at `t+1` (column `t`).
    pub entities: Grid<Option<EntityId>>,
}

impl AlignmentTable {
    /// Entity at `timestamp + 1` aligned with `entity` at `timestamp`.
    pub fn aligned(&self, entity: EntityId, timestamp: usize) -> Option<EntityId> {
        if timestamp >= self.entities.columns() {
            return None;
        }
        *self.entities.get(entity.index(), timestamp)
    }
}

/// Session-to-session alignment per adjacent pair of timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionAlignment {
    /// One injective map per adjacent pair.
    pub pairs: Vec<BTreeMap<SessionId, SessionId>>,
}

impl SessionAlignment {
    /// Session at `timestamp + 1` aligned with `session` at `timestamp`.
    pub fn target(&self, timestamp: usize, session: SessionId) -> Option<SessionId> {
        self.pairs.get(timestamp).and_then(|m| m.get(&session)).copied()
    }
}

/// Vertical tracks sessions occupy across timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotTable {
    /// Tracks top to bottom; one cell per timestamp.
    pub tracks: Vec<Vec<Option<SessionId>>>,
    /// Track holding the ego's session at every timestamp.
    pub ego_slot: usize,
}

impl SlotTable {
    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether there are no tracks.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Session in `slot` at `timestamp`.
    pub fn session(&self, slot: usize, timestamp: usize) -> Option<SessionId> {
        self.tracks[slot][timestamp]
    }
}

/// Per entity: whether its line runs both above and below the ego.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideTable(Vec<bool>);

impl SideTable {
    /// Wrap per-entity flags.
    pub fn new(flags: Vec<bool>) -> Self {
        Self(flags)
    }

    /// Whether `entity` switches sides.
    pub fn switches(&self, entity: EntityId) -> bool {
        self.0.get(entity.index()).copied().unwrap_or(false)
    }

    /// Entities that switch sides, ascending.
    pub fn switching(&self) -> Vec<EntityId> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, &flag)| flag)
            .map(|(i, _)| EntityId::new(i))
            .collect()
    }
}

/// Fingerprint of a layout for replay comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoutFingerprint(String);

impl LayoutFingerprint {
    /// Wrap a hash string.
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    /// The hash as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayoutFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Complete output of one engine run.
///
/// A valid layout carries:
/// - the ordering, alignment and compaction tables
/// - `policy_params_hash`: identity of the policy it was computed with
/// - `layout_id`: canonical fingerprint of the whole bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorylineLayout {
    /// The ego.
    pub ego: EntityId,
    /// Timestamp labels.
    pub timestamps: Vec<String>,
    /// Ordering stage output.
    pub ordering: OrderedTimeline,
    /// Entity alignment.
    pub alignment: AlignmentTable,
    /// Session alignment.
    pub session_alignment: SessionAlignment,
    /// Slot tracks.
    pub slots: SlotTable,
    /// Final heights, minimum at 0.
    pub heights: HeightTable,
    /// Side switching flags.
    pub sides: SideTable,
    /// Hash of policy parameters (quantized).
    pub policy_params_hash: String,
    /// Schema version.
    pub schema_version: String,
    /// Fingerprint of this layout.
    pub layout_id: LayoutFingerprint,
}

impl StorylineLayout {
    /// Assemble a layout and compute its fingerprint.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ego: EntityId,
        timestamps: Vec<String>,
        ordering: OrderedTimeline,
        alignment: AlignmentTable,
        session_alignment: SessionAlignment,
        slots: SlotTable,
        heights: HeightTable,
        sides: SideTable,
        policy_params_hash: String,
    ) -> Self {
        let layout_id = Self::compute_fingerprint(
            ego,
            &ordering,
            &alignment,
            &session_alignment,
            &heights,
            &sides,
            &policy_params_hash,
        );
        Self {
            ego,
            timestamps,
            ordering,
            alignment,
            session_alignment,
            slots,
            heights,
            sides,
            policy_params_hash,
            schema_version: STORYLINE_SCHEMA_VERSION.to_string(),
            layout_id,
        }
    }

    fn compute_fingerprint(
        ego: EntityId,
        ordering: &OrderedTimeline,
        alignment: &AlignmentTable,
        session_alignment: &SessionAlignment,
        heights: &HeightTable,
        sides: &SideTable,
        policy_params_hash: &str,
    ) -> LayoutFingerprint {
        let quantized: Grid<Option<i64>> = heights.map(|h| h.map(quantize_f64));
        let canonical = (
            ego,
            &ordering.orders,
            &alignment.pairs,
            &session_alignment.pairs,
            &quantized,
            sides,
            policy_params_hash,
            STORYLINE_SCHEMA_VERSION,
        );
        LayoutFingerprint::new(canonical_hash_hex(&canonical))
    }

    /// Height of `entity` at `timestamp`.
    pub fn height(&self, entity: EntityId, timestamp: usize) -> Option<f64> {
        *self.heights.get(entity.index(), timestamp)
    }

    /// The ego's constant height.
    pub fn ego_height(&self) -> Option<f64> {
        self.height(self.ego, 0)
    }

    /// Canonical fingerprint of this layout.
    pub fn fingerprint(&self) -> &LayoutFingerprint {
        &self.layout_id
    }

    /// Recompute the fingerprint and compare it with `layout_id`.
    pub fn verify_fingerprint(&self) -> bool {
        let recomputed = Self::compute_fingerprint(
            self.ego,
            &self.ordering,
            &self.alignment,
            &self.session_alignment,
            &self.heights,
            &self.sides,
            &self.policy_params_hash,
        );
        recomputed == self.layout_id
    }

    /// Number of entities.
    pub fn num_entities(&self) -> usize {
        self.heights.rows()
    }

    /// Number of timestamps.
    pub fn num_timestamps(&self) -> usize {
        self.heights.columns()
    }
}
