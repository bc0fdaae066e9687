//! Alignment stage: monotonic maximum-reward matching between neighbours.
//!
//! For each adjacent pair of timestamps the ordered entity sequences are
//! matched with an LCS-style dynamic program. The reward of matching
//! position `i` with position `j` is
//!
//! ```text
//! straight(i, j) + alpha * (1 - |(i+1)/|S_i| - (j+1)/|S_j||)
//! ```
//!
//! where `straight` counts members shared by the two sessions. Ego to ego
//! is rewarded with `f64::INFINITY`: the ego always stays straight, and
//! every line past the ego on both sides is matched by diagonal offset.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{
    AlignmentTable, EntityId, Grid, OrderedTimeline, SessionAlignment, SessionId, TimelineModel,
};

/// Backtracking move of the dynamic program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Diagonal,
    Left,
    Up,
}

/// Maximum-weight monotonic matching between `0..rows` and `0..columns`.
///
/// Ties prefer matching, then skipping the column, then skipping the row.
/// Returns the matched pairs in ascending order.
pub fn monotonic_matching(rewards: &Grid<f64>) -> Vec<(usize, usize)> {
    let (rows, columns) = (rewards.rows(), rewards.columns());
    if rows == 0 || columns == 0 {
        return Vec::new();
    }

    let mut table: Grid<f64> = Grid::filled(rows, columns, 0.0);
    let mut steps: Grid<Step> = Grid::filled(rows, columns, Step::Diagonal);
    let at = |table: &Grid<f64>, i: Option<usize>, j: Option<usize>| match (i, j) {
        (Some(i), Some(j)) => *table.get(i, j),
        _ => 0.0,
    };

    for i in 0..rows {
        for j in 0..columns {
            let candidates = [
                (at(&table, i.checked_sub(1), j.checked_sub(1)) + rewards.get(i, j), Step::Diagonal),
                (at(&table, Some(i), j.checked_sub(1)), Step::Left),
                (at(&table, i.checked_sub(1), Some(j)), Step::Up),
            ];
            let mut best = candidates[0];
            for candidate in &candidates[1..] {
                if candidate.0 > best.0 {
                    best = *candidate;
                }
            }
            table.set(i, j, best.0);
            steps.set(i, j, best.1);
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (rows as isize - 1, columns as isize - 1);
    while i >= 0 && j >= 0 {
        match steps.get(i as usize, j as usize) {
            Step::Diagonal => {
                pairs.push((i as usize, j as usize));
                i -= 1;
                j -= 1;
            }
            Step::Left => j -= 1,
            Step::Up => i -= 1,
        }
    }
    pairs.reverse();
    pairs
}

/// Members counted for the session of `entity` at `t`.
///
/// Idle entities all count as one group: the idle subsequence of `t`.
fn session_members<'a>(
    model: &'a TimelineModel,
    ordered: &'a OrderedTimeline,
    entity: EntityId,
    t: usize,
) -> &'a [EntityId] {
    match model.session_at(entity, t).and_then(|sid| model.session(sid)) {
        Some(session) if session.is_idle() => &ordered.idle[t],
        Some(session) => session.members(),
        None => &[],
    }
}

/// Reward matrix between the ordered entities of `t` and `t + 1`.
pub fn rewards(model: &TimelineModel, ordered: &OrderedTimeline, t: usize, alpha: f64) -> Grid<f64> {
    let current = &ordered.entities[t];
    let next = &ordered.entities[t + 1];
    let ego = model.ego();

    let current_members: Vec<&[EntityId]> = current.iter().map(|&e| session_members(model, ordered, e, t)).collect();
    let next_members: Vec<BTreeSet<EntityId>> = next
        .iter()
        .map(|&e| session_members(model, ordered, e, t + 1).iter().copied().collect())
        .collect();

    let mut grid: Grid<f64> = Grid::filled(current.len(), next.len(), 0.0);
    for (i, &a) in current.iter().enumerate() {
        for (j, &b) in next.iter().enumerate() {
            if a == ego && b == ego {
                grid.set(i, j, f64::INFINITY);
                continue;
            }
            let straight = current_members[i].iter().filter(|m| next_members[j].contains(*m)).count();
            let left = (i + 1) as f64 / current_members[i].len().max(1) as f64;
            let right = (j + 1) as f64 / next_members[j].len().max(1) as f64;
            let similarity = alpha * (1.0 - (left - right).abs());
            grid.set(i, j, straight as f64 + similarity);
        }
    }
    grid
}

/// Session alignment derived from the entity alignment.
///
/// The ego's sessions are paired first; then, in order, each entity whose
/// session is still unpaired claims the session of its aligned counterpart
/// if nobody claimed it yet.
fn align_sessions(model: &TimelineModel, ordered: &OrderedTimeline, entities: &Grid<Option<EntityId>>) -> SessionAlignment {
    let ego = model.ego();
    let mut pairs = Vec::with_capacity(entities.columns());

    for t in 0..entities.columns() {
        let mut aligned: BTreeMap<SessionId, SessionId> = BTreeMap::new();
        let mut claimed: BTreeSet<SessionId> = BTreeSet::new();
        if let (Some(from), Some(to)) = (model.session_at(ego, t), model.session_at(ego, t + 1)) {
            aligned.insert(from, to);
            claimed.insert(to);
        }

        for &entity in &ordered.entities[t] {
            if entity == ego {
                continue;
            }
            let Some(from) = model.session_at(entity, t) else {
                continue;
            };
            if aligned.contains_key(&from) {
                continue;
            }
            let target = (*entities.get(entity.index(), t)).and_then(|other| model.session_at(other, t + 1));
            if let Some(to) = target {
                if claimed.insert(to) {
                    aligned.insert(from, to);
                }
            }
        }
        pairs.push(aligned);
    }
    SessionAlignment { pairs }
}

/// Align every adjacent pair of timestamps.
pub fn aligning(model: &TimelineModel, ordered: &OrderedTimeline, alpha: f64) -> (AlignmentTable, SessionAlignment) {
    let gaps = ordered.num_timestamps().saturating_sub(1);
    let mut pairs = Vec::with_capacity(gaps);
    let mut entities: Grid<Option<EntityId>> = Grid::filled(model.num_entities(), gaps, None);

    for t in 0..gaps {
        let matched = monotonic_matching(&rewards(model, ordered, t, alpha));
        for &(i, j) in &matched {
            let from = ordered.entities[t][i];
            let to = ordered.entities[t + 1][j];
            entities.set(from.index(), t, Some(to));
        }
        pairs.push(matched);
    }

    let sessions = align_sessions(model, ordered, &entities);
    let straight = (0..gaps)
        .flat_map(|t| ordered.entities[t].iter().map(move |&e| (e, t)))
        .filter(|&(e, t)| *entities.get(e.index(), t) == Some(e))
        .count();
    tracing::debug!(pairs = gaps, straight, "Alignment complete");

    (AlignmentTable { pairs, entities }, sessions)
}
