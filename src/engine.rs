//! Storyline engine: ordering → alignment → compaction.
//!
//! The engine is a pure function of the model and the policy. It holds no
//! state between runs and either returns a complete layout or an error.

use crate::align::aligning;
use crate::compact::compacting;
use crate::order::ordering;
use crate::policy::LayoutPolicyV1;
use crate::types::{Entity, EntityId, Grid, ModelError, Session, SessionId, StorylineLayout, TimelineModel};

/// Error type for layout runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    /// The model handed to the engine is malformed.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The ego has no session (or is missing from its slot) at a timestamp.
    #[error("Ego not placed at timestamp {0}")]
    EgoNotPlaced(usize),
    /// A slot outside the ego block holds a session with more than one line.
    #[error("Slot session {session} at timestamp {timestamp} has {members} members, expected 1")]
    IdleSlotNotSingleton {
        /// Offending session.
        session: SessionId,
        /// Timestamp index.
        timestamp: usize,
        /// Member count found.
        members: usize,
    },
    /// The ego line is not straight after compaction.
    #[error("Ego height {height} at timestamp {timestamp} differs from {expected}")]
    EgoHeightNotUnique {
        /// Timestamp index.
        timestamp: usize,
        /// Height found.
        height: f64,
        /// Height at the first timestamp.
        expected: f64,
    },
}

/// Storyline layout engine.
///
/// ## Stages
///
/// 1. Ordering: `sweep_iterations` forward/backward barycenter sweeps
/// 2. Alignment: monotonic matching per adjacent pair, then session alignment
/// 3. Compaction: slots and heights under `policy.minimize`
///
/// Same model + same policy → identical layout and `layout_id`.
#[derive(Debug, Clone, Default)]
pub struct StorylineEngine {
    policy: LayoutPolicyV1,
}

impl StorylineEngine {
    /// Create an engine with the given policy.
    pub fn new(policy: LayoutPolicyV1) -> Self {
        Self { policy }
    }

    /// The policy this engine runs with.
    pub fn policy(&self) -> &LayoutPolicyV1 {
        &self.policy
    }

    /// Lay out a timeline model.
    pub fn fit(&self, model: &TimelineModel) -> Result<StorylineLayout, LayoutError> {
        let policy = &self.policy;
        tracing::debug!(
            entities = model.num_entities(),
            timestamps = model.num_timestamps(),
            policy = policy.policy_id(),
            "Layout started"
        );

        let ordered = ordering(model, policy.sweep_iterations);
        let (alignment, session_alignment) = aligning(model, &ordered, policy.order_similarity_weight);
        let compaction = compacting(model, policy, &ordered, &session_alignment)?;

        let layout = StorylineLayout::new(
            model.ego(),
            model.timestamps().to_vec(),
            ordered,
            alignment,
            session_alignment,
            compaction.slots,
            compaction.heights,
            compaction.sides,
            policy.params_hash(),
        );
        tracing::debug!(layout_id = %layout.layout_id, "Layout complete");
        Ok(layout)
    }

    /// Validate raw tables into a model, then lay it out.
    pub fn fit_tables(
        &self,
        entities: Vec<Entity>,
        timestamps: Vec<String>,
        ego: EntityId,
        sessions: Vec<Session>,
        table: Grid<Option<SessionId>>,
    ) -> Result<StorylineLayout, LayoutError> {
        let model = TimelineModel::new(entities, timestamps, ego, sessions, table)?;
        self.fit(&model)
    }
}
