//! Compaction stage: slots, heights and side flags.
//!
//! ## Pipeline
//!
//! ```text
//! session alignment → slots → ego block → objective pass → finish
//!                                              ↓
//!                                  space (idle packing + stretch)
//!                                  wiggles (multi-timestamp resolution)
//! ```
//!
//! `finish` flags side switchers, shifts every height so the minimum is 0
//! and verifies the ego line is straight.

pub mod context;
pub mod slots;
pub mod space;
pub mod wiggle;

pub use context::CompactionContext;
pub use slots::construct_slots;
pub use space::compact_space;
pub use wiggle::compact_wiggles;

use crate::engine::LayoutError;
use crate::policy::{LayoutPolicyV1, Minimize};
use crate::types::{HeightTable, OrderedTimeline, SessionAlignment, SideTable, SlotTable, TimelineModel};

/// Output of the compaction stage.
#[derive(Debug, Clone)]
pub struct Compaction {
    /// Slot tracks.
    pub slots: SlotTable,
    /// Final heights, minimum at 0.
    pub heights: HeightTable,
    /// Side switching flags.
    pub sides: SideTable,
}

/// Run the compaction stage under `policy.minimize`.
pub fn compacting(
    model: &TimelineModel,
    policy: &LayoutPolicyV1,
    ordered: &OrderedTimeline,
    alignment: &SessionAlignment,
) -> Result<Compaction, LayoutError> {
    let slots = construct_slots(model, ordered, alignment)?;
    let mut ctx = CompactionContext::new(model, policy, ordered, slots);

    match policy.minimize {
        Minimize::Space => compact_space(&mut ctx)?,
        Minimize::Wiggles => compact_wiggles(&mut ctx)?,
    }

    let (slots, heights, sides) = ctx.finish()?;
    tracing::debug!(
        minimize = ?policy.minimize,
        slots = slots.len(),
        switching = sides.switching().len(),
        "Compaction complete"
    );
    Ok(Compaction { slots, heights, sides })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, EntityId, Grid, HopPartition, Session, SessionId, WeightGroup};
    use crate::{align, order};

    fn e(i: usize) -> EntityId {
        EntityId::new(i)
    }

    fn sid(i: u32) -> SessionId {
        SessionId::new(i)
    }

    /// ego 0 with source 1 and target 2 at t0 and t2; both idle at t1.
    fn gap_model() -> TimelineModel {
        let table = Grid::from_rows(vec![
            vec![Some(sid(1)), Some(sid(2)), Some(sid(3))],
            vec![Some(sid(1)), Some(sid(4)), Some(sid(3))],
            vec![Some(sid(1)), Some(sid(5)), Some(sid(3))],
        ])
        .unwrap();
        let mut hops = HopPartition::ego_only(e(0));
        hops.sources = vec![WeightGroup::new(1, vec![e(1)])];
        hops.targets = vec![WeightGroup::new(1, vec![e(2)])];
        let sessions = vec![
            Session::contact(sid(1), 0, hops.clone(), Vec::new()),
            Session::contact(sid(2), 1, HopPartition::ego_only(e(0)), Vec::new()),
            Session::contact(sid(3), 2, hops, Vec::new()),
            Session::idle(sid(4), e(1)),
            Session::idle(sid(5), e(2)),
        ];
        let entities = (0..3).map(|i| Entity::new(e(i), format!("n{i}"))).collect();
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        TimelineModel::new(entities, labels, e(0), sessions, table).unwrap()
    }

    fn run(policy: &LayoutPolicyV1) -> Compaction {
        let model = gap_model();
        let ordered = order::ordering(&model, policy.sweep_iterations);
        let (_, sessions) = align::aligning(&model, &ordered, policy.order_similarity_weight);
        compacting(&model, policy, &ordered, &sessions).unwrap()
    }

    #[test]
    fn test_space_keeps_idle_lines_straight() {
        let result = run(&LayoutPolicyV1::default());
        let row = |i: usize| result.heights.row(i).to_vec();

        assert_eq!(row(0), vec![Some(5.0); 3]);
        assert_eq!(row(1), vec![Some(0.0); 3]);
        assert_eq!(row(2), vec![Some(10.0); 3]);
        assert!(result.sides.switching().is_empty());
        assert_eq!(result.slots.len(), 3);
    }

    #[test]
    fn test_wiggles_keep_idle_lines_straight() {
        let result = run(&LayoutPolicyV1::minimizing(Minimize::Wiggles));
        assert_eq!(result.heights.row(0).to_vec(), vec![Some(5.0); 3]);
        assert_eq!(result.heights.row(1).to_vec(), vec![Some(0.0); 3]);
        assert_eq!(result.heights.row(2).to_vec(), vec![Some(10.0); 3]);
    }

    #[test]
    fn test_minimum_height_is_zero() {
        for policy in [LayoutPolicyV1::default(), LayoutPolicyV1::minimizing(Minimize::Wiggles)] {
            let result = run(&policy);
            let minimum = (0..result.heights.rows())
                .flat_map(|r| result.heights.row(r).iter().flatten().copied())
                .fold(f64::INFINITY, f64::min);
            assert_eq!(minimum, 0.0);
        }
    }
}
