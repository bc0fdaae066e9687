//! Shared working state of the compaction stage.

use std::collections::BTreeSet;

use crate::engine::LayoutError;
use crate::policy::{min_distance, LayoutPolicyV1, PairContext};
use crate::types::{
    EntityId, Grid, HeightTable, OrderedTimeline, Presence, SideTable, SlotTable, TimelineModel,
};

/// Sign with zero counted as positive.
pub(crate) fn side(height: f64) -> f64 {
    if height < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Whether two heights lie on the same side of the ego.
pub(crate) fn same_side(a: f64, b: f64) -> bool {
    side(a) == side(b)
}

/// Working tables threaded through slot-based height assignment.
pub struct CompactionContext<'a> {
    pub(crate) model: &'a TimelineModel,
    pub(crate) policy: &'a LayoutPolicyV1,
    pub(crate) ordered: &'a OrderedTimeline,
    pub(crate) slots: SlotTable,
    /// Heights relative to the ego (ego at 0).
    pub(crate) heights: HeightTable,
    /// Snapshot of the ego-block heights before any adjustment.
    pub(crate) reference: HeightTable,
    /// Members of the ego's slot per timestamp, top to bottom.
    pub(crate) block: Vec<Vec<EntityId>>,
    /// `(min, max)` of the ego block per timestamp.
    pub(crate) block_range: Vec<(f64, f64)>,
    /// Entities whose heights are already settled.
    pub(crate) dealt: BTreeSet<EntityId>,
}

impl<'a> CompactionContext<'a> {
    /// Empty tables for `model`.
    pub fn new(
        model: &'a TimelineModel,
        policy: &'a LayoutPolicyV1,
        ordered: &'a OrderedTimeline,
        slots: SlotTable,
    ) -> Self {
        let (rows, columns) = (model.num_entities(), model.num_timestamps());
        Self {
            model,
            policy,
            ordered,
            slots,
            heights: Grid::filled(rows, columns, None),
            reference: Grid::filled(rows, columns, None),
            block: vec![Vec::new(); columns],
            block_range: vec![(0.0, 0.0); columns],
            dealt: BTreeSet::new(),
        }
    }

    pub(crate) fn num_timestamps(&self) -> usize {
        self.model.num_timestamps()
    }

    /// Members of the session in `slot` at `t`, in ordered sequence.
    pub(crate) fn slot_members(&self, slot: usize, t: usize) -> Vec<EntityId> {
        let Some(session) = self.slots.session(slot, t) else {
            return Vec::new();
        };
        self.ordered.entities[t]
            .iter()
            .copied()
            .filter(|&e| self.model.session_at(e, t) == Some(session))
            .collect()
    }

    /// Spacing context of the ego's session at `t`.
    pub(crate) fn ego_context(&self, t: usize) -> PairContext<'a> {
        let model: &'a TimelineModel = self.model;
        match model.session_at(model.ego(), t).and_then(|sid| model.session(sid)) {
            Some(session) if !session.is_idle() => PairContext::Session(session),
            _ => PairContext::Unconstrained,
        }
    }

    pub(crate) fn distance(&self, a: EntityId, b: EntityId, context: PairContext<'_>) -> f64 {
        min_distance(self.policy, self.model.entity(a), self.model.entity(b), context)
    }

    /// Spacing next to an idle line.
    pub(crate) fn squeeze(&self) -> f64 {
        self.policy.squeeze_distance()
    }

    pub(crate) fn height(&self, entity: EntityId, t: usize) -> Option<f64> {
        *self.heights.get(entity.index(), t)
    }

    pub(crate) fn set_height(&mut self, entity: EntityId, t: usize, height: f64) {
        self.heights.set(entity.index(), t, Some(height));
    }

    pub(crate) fn presence(&self, entity: EntityId, t: usize) -> Presence {
        self.model.presence(entity, t)
    }

    /// Whether any line already sits at exactly `height` at `t`.
    pub(crate) fn is_used(&self, t: usize, height: f64) -> bool {
        (0..self.heights.rows()).any(|r| *self.heights.get(r, t) == Some(height))
    }

    /// Whether any line other than `entity` sits at exactly `height` at `t`.
    pub(crate) fn is_used_by_other(&self, t: usize, height: f64, entity: EntityId) -> bool {
        (0..self.heights.rows())
            .filter(|&r| r != entity.index())
            .any(|r| *self.heights.get(r, t) == Some(height))
    }

    /// Non-ego lines placed at `t`, sorted by height then entity index.
    pub(crate) fn placed_others(&self, t: usize) -> Vec<(EntityId, f64)> {
        let ego = self.model.ego();
        let mut placed: Vec<(EntityId, f64)> = (0..self.heights.rows())
            .map(EntityId::new)
            .filter(|&e| e != ego)
            .filter_map(|e| self.height(e, t).map(|h| (e, h)))
            .collect();
        placed.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        placed
    }

    /// Stack the ego's slot members top to bottom and shift the ego to 0.
    pub(crate) fn place_ego_block(&mut self) -> Result<(), LayoutError> {
        let ego = self.model.ego();
        for t in 0..self.num_timestamps() {
            let members = self.slot_members(self.slots.ego_slot, t);
            let context = self.ego_context(t);

            let mut offsets = Vec::with_capacity(members.len());
            let mut current = 0.0;
            for (idx, &entity) in members.iter().enumerate() {
                if idx > 0 {
                    current += self.distance(members[idx - 1], entity, context);
                }
                offsets.push(current);
            }
            let ego_offset = members
                .iter()
                .position(|&e| e == ego)
                .map(|idx| offsets[idx])
                .ok_or(LayoutError::EgoNotPlaced(t))?;

            let mut range = (f64::INFINITY, f64::NEG_INFINITY);
            for (&entity, offset) in members.iter().zip(offsets) {
                let height = offset - ego_offset;
                self.set_height(entity, t, height);
                range = (range.0.min(height), range.1.max(height));
            }
            self.block_range[t] = range;
            self.block[t] = members;
        }
        self.reference = self.heights.clone();
        Ok(())
    }

    /// Flag side switchers, shift the minimum to 0 and check the ego line.
    pub(crate) fn finish(self) -> Result<(SlotTable, HeightTable, SideTable), LayoutError> {
        let ego = self.model.ego();
        let rows = self.heights.rows();

        let flags = (0..rows)
            .map(|r| {
                let row = self.heights.row(r);
                let above = row.iter().flatten().any(|&h| h < 0.0);
                let below = row.iter().flatten().any(|&h| h > 0.0);
                above && below
            })
            .collect();

        let minimum = (0..rows)
            .flat_map(|r| self.heights.row(r).iter().flatten().copied())
            .fold(f64::INFINITY, f64::min);
        let offset = if minimum.is_finite() { -minimum } else { 0.0 };
        let heights = self.heights.map(|h| h.map(|v| v + offset));

        let ego_row = heights.row(ego.index());
        let first = ego_row.first().copied().flatten();
        for (t, h) in ego_row.iter().enumerate() {
            match (h, first) {
                (Some(h), Some(first)) if *h == first => {}
                (None, _) | (_, None) => return Err(LayoutError::EgoNotPlaced(t)),
                (Some(h), Some(first)) => {
                    tracing::error!(timestamp = t, height = *h, expected = first, "Ego line is not straight");
                    return Err(LayoutError::EgoHeightNotUnique {
                        timestamp: t,
                        height: *h,
                        expected: first,
                    });
                }
            }
        }

        Ok((self.slots, heights, SideTable::new(flags)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_counts_as_below() {
        assert!(same_side(0.0, 3.0));
        assert!(!same_side(0.0, -3.0));
        assert!(same_side(-1.0, -20.0));
        assert_eq!(side(0.0), 1.0);
    }
}
