//! Ordering stage: constrained barycenter sweeps.
//!
//! ## Algorithm
//!
//! Each timestamp holds a list of lanes (one per session). A sweep from a
//! source timestamp to a target timestamp:
//!
//! 1. reorders the members of every weight group (and two-hop bucket) of
//!    each contact lane by their order at the source timestamp, falling back
//!    to their own current order;
//! 2. stable-sorts the lanes by session barycenter;
//! 3. renumbers every member of the target timestamp by its position.
//!
//! Members never cross bucket boundaries and idle lanes keep their single
//! member. One iteration is a forward pass followed by a backward pass.

use crate::types::{
    EntityId, Grid, HopPartition, OrderedTimeline, SessionId, TimelineModel,
};

/// A session placed at one timestamp.
#[derive(Debug, Clone)]
struct Lane<'m> {
    session: SessionId,
    members: Vec<EntityId>,
    hops: Option<&'m HopPartition>,
}

/// Mutable sweep state: lanes per timestamp and the current orders.
struct SweepState<'m> {
    lanes: Vec<Vec<Lane<'m>>>,
    orders: Grid<Option<usize>>,
}

impl<'m> SweepState<'m> {
    /// Sessions in ascending id; each member ordered by its index in its session.
    fn initial(model: &'m TimelineModel) -> Self {
        let mut orders = Grid::filled(model.num_entities(), model.num_timestamps(), None);
        let mut lanes = Vec::with_capacity(model.num_timestamps());

        for t in 0..model.num_timestamps() {
            let mut column = Vec::new();
            for sid in model.sessions_at(t) {
                let Some(session) = model.session(sid) else {
                    continue;
                };
                let members = if session.is_idle() {
                    model.members_at(sid, t)
                } else {
                    session.members().to_vec()
                };
                for (idx, entity) in members.iter().enumerate() {
                    orders.set(entity.index(), t, Some(idx));
                }
                column.push(Lane {
                    session: sid,
                    members,
                    hops: session.hops(),
                });
            }
            lanes.push(column);
        }
        Self { lanes, orders }
    }

    fn order(&self, entity: EntityId, t: usize) -> Option<usize> {
        *self.orders.get(entity.index(), t)
    }

    /// Reorder timestamp `target` against `source`.
    fn sweep(&mut self, source: usize, target: usize) {
        let mut lanes = std::mem::take(&mut self.lanes[target]);

        for lane in lanes.iter_mut() {
            let Some(hops) = lane.hops else {
                continue;
            };
            let mut start = 0;
            for group in hops.groups() {
                let end = start + group.len();
                if group.len() > 1 {
                    let mut sorted = group.to_vec();
                    sorted.sort_by_key(|&e| self.barycenter_leaf(e, source, target));
                    lane.members[start..end].copy_from_slice(&sorted);
                }
                start = end;
            }
        }

        let barycenters: Vec<f64> = lanes.iter().map(|lane| self.session_barycenter(lane, source)).collect();
        let mut indexed: Vec<(f64, Lane<'m>)> = barycenters.into_iter().zip(lanes).collect();
        indexed.sort_by(|a, b| a.0.total_cmp(&b.0));
        let lanes: Vec<Lane<'m>> = indexed.into_iter().map(|(_, lane)| lane).collect();

        let mut position = 0;
        for lane in &lanes {
            for entity in &lane.members {
                self.orders.set(entity.index(), target, Some(position));
                position += 1;
            }
        }
        self.lanes[target] = lanes;
    }

    /// Order at the source timestamp when present there, else the current order.
    fn barycenter_leaf(&self, entity: EntityId, source: usize, target: usize) -> usize {
        self.order(entity, source)
            .or_else(|| self.order(entity, target))
            .unwrap_or(0)
    }

    /// Sum of source orders of members present at `source`, over the lane size.
    fn session_barycenter(&self, lane: &Lane<'_>, source: usize) -> f64 {
        if lane.members.is_empty() {
            return 0.0;
        }
        let sum: usize = lane.members.iter().filter_map(|&e| self.order(e, source)).sum();
        sum as f64 / lane.members.len() as f64
    }

    fn into_timeline(self, model: &TimelineModel) -> OrderedTimeline {
        let mut orders = Grid::filled(model.num_entities(), model.num_timestamps(), None);
        let mut entities = Vec::with_capacity(self.lanes.len());
        let mut idle = Vec::with_capacity(self.lanes.len());
        let mut sessions = Vec::with_capacity(self.lanes.len());

        for (t, lanes) in self.lanes.into_iter().enumerate() {
            let ordered: Vec<EntityId> = lanes.iter().flat_map(|l| l.members.iter().copied()).collect();
            for (position, entity) in ordered.iter().enumerate() {
                orders.set(entity.index(), t, Some(position as u32 + 1));
            }
            idle.push(
                lanes
                    .iter()
                    .filter(|l| model.is_idle(l.session))
                    .flat_map(|l| l.members.iter().copied())
                    .collect(),
            );
            sessions.push(lanes.iter().map(|l| l.session).collect());
            entities.push(ordered);
        }

        OrderedTimeline {
            orders,
            entities,
            idle,
            sessions,
        }
    }
}

/// Order every timestamp of `model` with `iterations` forward/backward sweeps.
pub fn ordering(model: &TimelineModel, iterations: usize) -> OrderedTimeline {
    let mut state = SweepState::initial(model);
    let last = model.num_timestamps().saturating_sub(1);

    for _ in 0..iterations {
        for t in 0..last {
            state.sweep(t, t + 1);
        }
        for t in (1..=last).rev() {
            state.sweep(t, t - 1);
        }
    }

    let timeline = state.into_timeline(model);
    tracing::debug!(
        iterations,
        timestamps = timeline.num_timestamps(),
        crossings = count_crossings(&timeline),
        "Ordering complete"
    );
    timeline
}

/// Number of pairwise order swaps between adjacent timestamps.
///
/// Only entities present at both timestamps count.
pub fn count_crossings(timeline: &OrderedTimeline) -> usize {
    let mut crossings = 0;
    for t in 0..timeline.num_timestamps().saturating_sub(1) {
        let shared: Vec<(u32, u32)> = timeline.entities[t]
            .iter()
            .filter_map(|&e| Some((timeline.rank(e, t)?, timeline.rank(e, t + 1)?)))
            .collect();
        for (i, a) in shared.iter().enumerate() {
            for b in &shared[i + 1..] {
                if (a.0 < b.0) != (a.1 < b.1) {
                    crossings += 1;
                }
            }
        }
    }
    crossings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, Session, WeightGroup};

    fn e(i: usize) -> EntityId {
        EntityId::new(i)
    }

    fn s(id: u32) -> Option<SessionId> {
        Some(SessionId::new(id))
    }

    fn entities(n: usize) -> Vec<Entity> {
        (0..n).map(|i| Entity::new(e(i), format!("n{i}"))).collect()
    }

    fn sources(ego: usize, members: &[usize]) -> HopPartition {
        let mut hops = HopPartition::ego_only(e(ego));
        hops.sources = vec![WeightGroup::new(1, members.iter().map(|&i| e(i)).collect())];
        hops
    }

    /// t0: sources [1, 2]; t1: sources [2, 1]. The sweep should align t1 with t0.
    fn swapped_model() -> TimelineModel {
        let table = Grid::from_rows(vec![
            vec![s(1), s(2)],
            vec![s(1), s(2)],
            vec![s(1), s(2)],
        ])
        .unwrap();
        let sessions = vec![
            Session::contact(SessionId::new(1), 0, sources(0, &[1, 2]), Vec::new()),
            Session::contact(SessionId::new(2), 1, sources(0, &[2, 1]), Vec::new()),
        ];
        let labels = vec!["a".to_string(), "b".to_string()];
        TimelineModel::new(entities(3), labels, e(0), sessions, table).unwrap()
    }

    #[test]
    fn test_within_group_follows_neighbour() {
        let timeline = ordering(&swapped_model(), 10);
        assert_eq!(timeline.entities[0], vec![e(1), e(2), e(0)]);
        assert_eq!(timeline.entities[1], vec![e(1), e(2), e(0)]);
        assert_eq!(count_crossings(&timeline), 0);
    }

    #[test]
    fn test_zero_iterations_keeps_declared_order() {
        let timeline = ordering(&swapped_model(), 0);
        assert_eq!(timeline.entities[1], vec![e(2), e(1), e(0)]);
        assert_eq!(timeline.rank(e(2), 1), Some(1));
        assert_eq!(count_crossings(&timeline), 1);
    }

    #[test]
    fn test_members_never_cross_buckets() {
        // t1 puts 1 in a target group; it must stay below the ego.
        let table = Grid::from_rows(vec![
            vec![s(1), s(2)],
            vec![s(1), s(2)],
            vec![s(1), s(2)],
        ])
        .unwrap();
        let mut t1 = sources(0, &[2]);
        t1.targets = vec![WeightGroup::new(1, vec![e(1)])];
        let sessions = vec![
            Session::contact(SessionId::new(1), 0, sources(0, &[1, 2]), Vec::new()),
            Session::contact(SessionId::new(2), 1, t1, Vec::new()),
        ];
        let labels = vec!["a".to_string(), "b".to_string()];
        let model = TimelineModel::new(entities(3), labels, e(0), sessions, table).unwrap();

        let timeline = ordering(&model, 10);
        assert_eq!(timeline.entities[1], vec![e(2), e(0), e(1)]);
    }

    #[test]
    fn test_idle_lanes_reported() {
        let table = Grid::from_rows(vec![
            vec![s(1), s(2), s(3)],
            vec![s(1), s(4), s(3)],
        ])
        .unwrap();
        let sessions = vec![
            Session::contact(SessionId::new(1), 0, sources(0, &[1]), Vec::new()),
            Session::contact(SessionId::new(2), 1, HopPartition::ego_only(e(0)), Vec::new()),
            Session::contact(SessionId::new(3), 2, sources(0, &[1]), Vec::new()),
            Session::idle(SessionId::new(4), e(1)),
        ];
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let model = TimelineModel::new(entities(2), labels, e(0), sessions, table).unwrap();

        let timeline = ordering(&model, 10);
        assert_eq!(timeline.idle[1], vec![e(1)]);
        assert!(timeline.idle[0].is_empty());
        assert_eq!(timeline.sessions[1].len(), 2);
        // the idle line sat above the ego on both sides of the gap
        assert_eq!(timeline.entities[1], vec![e(1), e(0)]);
    }
}
