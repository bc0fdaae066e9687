//! Wiggle objective: keep lines straight across timestamps.
//!
//! Every entity that sits in the ego block at two or more timestamps is
//! settled in first-seen order. Over its span each timestamp gets a desired
//! height; contact lines are only moved away from the ego and drag the lines
//! beyond them along, idle lines are slotted in with one of several
//! insertion strategies.

use std::collections::BTreeMap;

use super::context::{same_side, side, CompactionContext};
use crate::engine::LayoutError;
use crate::types::{EntityId, Presence};

/// How an idle line was fitted between its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insertion {
    /// Everyone beyond is settled and already far enough away.
    SimpleInsert,
    /// Everyone beyond is inside the block and movable.
    SimplePush,
    /// The movable part of the block moves as one.
    WholeBlockPush,
    /// Only the lines up to the first wide gap move.
    PartialBlockPush,
    /// Fallback: nearest free height, alternating directions.
    Alternating,
}

/// Assign heights minimising direction changes.
pub fn compact_wiggles(ctx: &mut CompactionContext<'_>) -> Result<(), LayoutError> {
    ctx.place_ego_block()?;

    let mut settled = 0;
    for (entity, times) in block_appearances(ctx) {
        let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
            continue;
        };
        if times.len() < 2 {
            continue;
        }
        ctx.dealt.insert(entity);
        settled += 1;

        for t in first..=last {
            let Some(height) = desired_height(ctx, entity, &times, t) else {
                continue;
            };
            let others = ctx.placed_others(t);
            match others.iter().position(|&(e, _)| e == entity) {
                Some(pos) => settle_contact(ctx, entity, t, height, &others, pos),
                None => settle_idle(ctx, entity, t, height, &others),
            }
        }
    }

    tracing::debug!(settled, "Wiggle compaction complete");
    Ok(())
}

/// Timestamps at which each non-ego entity sits in the ego block.
///
/// Entities are listed in first-seen order; within a timestamp the lines
/// above the ego come first (closest first), then the lines below.
fn block_appearances(ctx: &CompactionContext<'_>) -> Vec<(EntityId, Vec<usize>)> {
    let ego = ctx.model.ego();
    let mut appearances: Vec<(EntityId, Vec<usize>)> = Vec::new();
    let mut index: BTreeMap<EntityId, usize> = BTreeMap::new();

    for (t, block) in ctx.block.iter().enumerate() {
        let Some(ego_pos) = block.iter().position(|&e| e == ego) else {
            continue;
        };
        let above = block[..ego_pos].iter().rev();
        let below = block[ego_pos + 1..].iter();
        for &entity in above.chain(below) {
            match index.get(&entity) {
                Some(&i) => appearances[i].1.push(t),
                None => {
                    index.insert(entity, appearances.len());
                    appearances.push((entity, vec![t]));
                }
            }
        }
    }
    appearances
}

/// Height `entity` should take at `t`.
fn desired_height(ctx: &CompactionContext<'_>, entity: EntityId, times: &[usize], t: usize) -> Option<f64> {
    match ctx.presence(entity, t) {
        Presence::Absent => None,
        Presence::Idle => {
            let mut start = t;
            while start > 0 && ctx.presence(entity, start - 1) == Presence::Idle {
                start -= 1;
            }
            let mut end = t + 1;
            while end < ctx.num_timestamps() && ctx.presence(entity, end) == Presence::Idle {
                end += 1;
            }
            if let Some(h) = (start..end).find_map(|c| ctx.height(entity, c)) {
                return Some(h);
            }

            let before = start.checked_sub(1).and_then(|c| ctx.height(entity, c));
            let after = if end < ctx.num_timestamps() { ctx.height(entity, end) } else { None };
            match (before, after) {
                (Some(a), Some(b)) if same_side(a, b) || a.abs() < b.abs() => Some(a),
                (Some(_), Some(b)) => Some(b),
                (a, b) => a.or(b),
            }
        }
        Presence::Contact => {
            let current = ctx.height(entity, t)?;
            let timeline: Vec<f64> = times.iter().filter_map(|&c| ctx.height(entity, c)).collect();
            let first = *timeline.first()?;
            let farthest = if side(first) > 0.0 {
                timeline.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            } else {
                timeline.iter().copied().fold(f64::INFINITY, f64::min)
            };
            if (farthest - current).abs() > ctx.policy.thresholds.max_jump {
                Some(current)
            } else {
                Some(farthest)
            }
        }
    }
}

/// Move a contact line away from the ego, dragging the lines beyond it.
fn settle_contact(
    ctx: &mut CompactionContext<'_>,
    entity: EntityId,
    t: usize,
    height: f64,
    others: &[(EntityId, f64)],
    pos: usize,
) {
    let current = others[pos].1;
    if current == height || !same_side(current, height) {
        return;
    }
    let direction = side(height);
    if (direction > 0.0 && height < current) || (direction < 0.0 && height > current) {
        return;
    }

    let rest: Vec<EntityId> = if direction > 0.0 {
        others[pos + 1..].iter().map(|&(e, _)| e).collect()
    } else {
        others[..pos].iter().rev().map(|&(e, _)| e).collect()
    };

    let Some(differences) = beyond_offsets(ctx, entity, t, height, &rest, direction) else {
        return;
    };
    ctx.set_height(entity, t, height);
    for (&e, difference) in rest.iter().zip(differences) {
        if let Some(d) = difference {
            ctx.set_height(e, t, height + d * direction);
        }
    }
}

/// Offsets of the lines beyond a moved contact line, if the move is allowed.
///
/// A line already far enough away keeps its current distance (nudged past
/// any earlier line within the shared-slot tolerance); a closer line moves
/// to its reference distance unless it is settled. Idle lines keep their
/// place and block the move when settled and crowded.
fn beyond_offsets(
    ctx: &CompactionContext<'_>,
    entity: EntityId,
    t: usize,
    assign: f64,
    rest: &[EntityId],
    direction: f64,
) -> Option<Vec<Option<f64>>> {
    let tolerance = ctx.policy.thresholds.shared_slot_tolerance;
    let own_reference = *ctx.reference.get(entity.index(), t);
    let mut allowed = true;
    let mut differences: Vec<Option<f64>> = Vec::with_capacity(rest.len());

    for &e in rest {
        let current = ctx.height(e, t).unwrap_or(assign);
        let current_diff = (current - assign) * direction;
        let settled = ctx.dealt.contains(&e);
        let known: Vec<f64> = differences.iter().flatten().copied().collect();

        let desired = match (*ctx.reference.get(e.index(), t), own_reference) {
            (Some(a), Some(b)) => (a - b) * direction,
            _ => {
                let crowded = known.iter().any(|d| (d - current_diff).abs() < ctx.squeeze());
                if (current == assign || crowded) && settled {
                    allowed = false;
                }
                differences.push(None);
                continue;
            }
        };

        let unaffected = current_diff > desired;
        let movable = current_diff < desired && !settled;
        let difference = if unaffected {
            known
                .iter()
                .copied()
                .filter(|d| (d - current_diff).abs() < tolerance)
                .reduce(f64::max)
                .map_or(current_diff, |d| d + tolerance)
        } else {
            desired
        };
        differences.push(Some(difference));
        allowed &= unaffected || movable;
    }

    allowed.then_some(differences)
}

/// Place an idle line at `height`, making room when it lands on contact lines.
fn settle_idle(ctx: &mut CompactionContext<'_>, entity: EntityId, t: usize, height: f64, others: &[(EntityId, f64)]) {
    let direction = side(height);
    let clearance = ctx.policy.thresholds.idle_clearance;
    let to_move: Vec<bool> = others
        .iter()
        .map(|&(_, h)| {
            let detect = h + clearance * direction;
            if direction > 0.0 {
                detect > height
            } else {
                detect < height
            }
        })
        .collect();

    let blocking = others
        .iter()
        .zip(&to_move)
        .filter(|(_, &moved)| moved)
        .any(|(&(e, h), _)| ctx.presence(e, t) == Presence::Contact || h == height);
    if !blocking {
        ctx.set_height(entity, t, height);
        return;
    }

    let (placement, insertion) = insert_idle(ctx, entity, t, height, others, &to_move, direction);
    tracing::debug!(%entity, timestamp = t, ?insertion, "Idle line inserted");
    for (e, offset) in placement {
        ctx.set_height(e, t, height + offset);
    }
}

/// Offsets (relative to `assign`) for the idle line and any pushed lines.
fn insert_idle(
    ctx: &CompactionContext<'_>,
    entity: EntityId,
    t: usize,
    assign: f64,
    others: &[(EntityId, f64)],
    to_move: &[bool],
    direction: f64,
) -> (Vec<(EntityId, f64)>, Insertion) {
    let thresholds = &ctx.policy.thresholds;
    let clearance = thresholds.idle_clearance;
    let squeeze = ctx.squeeze();
    let block = &ctx.block[t];

    let rest: Vec<(EntityId, f64)> = others
        .iter()
        .zip(to_move)
        .filter(|(_, &moved)| moved)
        .map(|(&pair, _)| pair)
        .collect();

    let (lo, hi) = block
        .iter()
        .filter_map(|&e| ctx.height(e, t))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| (lo.min(h), hi.max(h)));
    let (lo, hi) = (lo - thresholds.point_radius, hi + thresholds.point_radius);
    let inside: Vec<bool> = rest.iter().map(|&(_, h)| lo <= h && h <= hi).collect();
    let movable: Vec<bool> = rest.iter().map(|(e, _)| !ctx.dealt.contains(e)).collect();
    let hypothetical: Vec<f64> = rest.iter().map(|&(_, h)| h + clearance * direction).collect();

    let movable_inside = inside.iter().zip(&movable).filter(|(_, &m)| m).all(|(&i, _)| i);
    let settled_inside = inside.iter().zip(&movable).filter(|(_, &m)| !m).any(|(&i, _)| i);

    let with_moves = |moves: &[bool]| -> Vec<(EntityId, f64)> {
        std::iter::once((entity, 0.0))
            .chain(rest.iter().enumerate().map(|(idx, &(e, h))| {
                let target = if moves[idx] { hypothetical[idx] } else { h };
                (e, target - assign)
            }))
            .collect()
    };

    if movable.iter().all(|m| !m) {
        let mut placement = vec![(entity, 0.0)];
        let fits = rest.iter().all(|&(e, h)| {
            if (h - assign) * direction >= squeeze {
                placement.push((e, h - assign));
                true
            } else {
                false
            }
        });
        if fits {
            return (placement, Insertion::SimpleInsert);
        }
    } else if inside.iter().all(|&i| i) && movable.iter().all(|&m| m) {
        let context = ctx.ego_context(t);
        let mut ordered: Vec<EntityId> = rest.iter().map(|&(e, _)| e).collect();
        if direction < 0.0 {
            ordered.reverse();
        }
        let boundary = if direction > 0.0 {
            to_move.iter().rposition(|&m| !m)
        } else {
            to_move.iter().position(|&m| !m)
        };
        let neighbour = boundary.map(|idx| others[idx].0);

        let mut placement = vec![(entity, 0.0)];
        let mut offset = 0.0;
        for (idx, &e) in ordered.iter().enumerate() {
            let previous = if idx > 0 { Some(ordered[idx - 1]) } else { neighbour };
            let desired = match previous {
                Some(p) if block.contains(&p) && block.contains(&e) => ctx.distance(p, e, context) * direction,
                _ => clearance * direction,
            };
            offset += desired;
            placement.push((e, offset));
        }
        return (placement, Insertion::SimplePush);
    } else if movable_inside && !settled_inside {
        let pick = |want_movable: bool| hypothetical.iter().zip(&movable).filter(move |(_, &m)| m == want_movable).map(|(&h, _)| h);
        let (settled_edge, movable_edge) = if direction > 0.0 {
            (pick(false).reduce(f64::min), pick(true).reduce(f64::max))
        } else {
            (pick(false).reduce(f64::max), pick(true).reduce(f64::min))
        };
        if let (Some(a), Some(b)) = (settled_edge, movable_edge) {
            if (a - b).abs() > thresholds.block_push_margin {
                return (with_moves(&movable), Insertion::WholeBlockPush);
            }
        }
    } else if movable_inside && settled_inside {
        let n = rest.len();
        let mut moves = vec![false; n];
        let mut insert = false;
        let walk: Vec<usize> = if direction > 0.0 {
            (0..n.saturating_sub(1)).collect()
        } else {
            (1..n).rev().collect()
        };
        let begin = if direction > 0.0 { 0 } else { n.saturating_sub(1) };
        let context = ctx.ego_context(t);

        for idx in walk {
            let (e, h) = rest[idx];
            let next = if direction > 0.0 { idx + 1 } else { idx - 1 };
            if idx == begin && (h - assign) * direction > squeeze {
                insert = true;
                break;
            }
            let (next_entity, next_height) = rest[next];
            let minimal = if block.contains(&e) && block.contains(&next_entity) {
                ctx.distance(e, next_entity, context)
            } else {
                squeeze
            };
            let gap = if direction > 0.0 {
                next_height - hypothetical[idx]
            } else {
                hypothetical[idx] - next_height
            };
            if gap > minimal {
                if direction > 0.0 {
                    moves[..=idx].fill(true);
                } else {
                    moves[idx..].fill(true);
                }
                break;
            }
        }
        if insert || moves.iter().any(|&m| m) {
            return (with_moves(&moves), Insertion::PartialBlockPush);
        }
    }

    let heights: Vec<f64> = others.iter().map(|&(_, h)| h).collect();
    let crowded = |candidate: f64| heights.iter().any(|h| (h - candidate).abs() < clearance);
    let mut candidate = assign;
    let mut attempts = 0;
    while crowded(candidate) {
        let flip = if attempts % 2 == 0 { 1.0 } else { -1.0 };
        candidate = assign + clearance * direction * flip * (attempts / 2 + 1) as f64;
        attempts += 1;
        if attempts > thresholds.insertion_retries {
            break;
        }
    }
    tracing::debug!(%entity, timestamp = t, attempts, "Idle insertion fell back to alternating search");
    (vec![(entity, candidate - assign)], Insertion::Alternating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact::slots::construct_slots;
    use crate::policy::{LayoutPolicyV1, Minimize};
    use crate::types::{Entity, Grid, HopPartition, Session, SessionId, TimelineModel, WeightGroup};
    use crate::{align, order};

    fn e(i: usize) -> EntityId {
        EntityId::new(i)
    }

    fn sid(i: u32) -> SessionId {
        SessionId::new(i)
    }

    /// ego 0 with sources [1] at t0 and sources [2, 1] at t1.
    fn shifting_model() -> TimelineModel {
        let table = Grid::from_rows(vec![
            vec![Some(sid(1)), Some(sid(2))],
            vec![Some(sid(1)), Some(sid(2))],
            vec![None, Some(sid(2))],
        ])
        .unwrap();
        let mut t0 = HopPartition::ego_only(e(0));
        t0.sources = vec![WeightGroup::new(1, vec![e(1)])];
        let mut t1 = HopPartition::ego_only(e(0));
        t1.sources = vec![WeightGroup::new(1, vec![e(2), e(1)])];
        let sessions = vec![
            Session::contact(sid(1), 0, t0, Vec::new()),
            Session::contact(sid(2), 1, t1, Vec::new()),
        ];
        let entities = (0..3).map(|i| Entity::new(e(i), format!("n{i}"))).collect();
        TimelineModel::new(entities, vec!["a".into(), "b".into()], e(0), sessions, table).unwrap()
    }

    #[test]
    fn test_contact_lines_keep_their_height() {
        let model = shifting_model();
        let policy = LayoutPolicyV1::minimizing(Minimize::Wiggles);
        let ordered = order::ordering(&model, policy.sweep_iterations);
        let (_, sessions) = align::aligning(&model, &ordered, policy.order_similarity_weight);
        let slots = construct_slots(&model, &ordered, &sessions).unwrap();

        let mut ctx = CompactionContext::new(&model, &policy, &ordered, slots);
        compact_wiggles(&mut ctx).unwrap();

        // entity 1 sits directly above the ego at both timestamps.
        assert_eq!(ctx.height(e(1), 0), Some(-5.0));
        assert_eq!(ctx.height(e(1), 1), Some(-5.0));
        assert_eq!(ctx.height(e(2), 1), Some(-10.0));
        assert_eq!(ctx.height(e(0), 0), Some(0.0));
    }

    #[test]
    fn test_appearances_list_closest_first() {
        let model = shifting_model();
        let policy = LayoutPolicyV1::default();
        let ordered = order::ordering(&model, policy.sweep_iterations);
        let (_, sessions) = align::aligning(&model, &ordered, policy.order_similarity_weight);
        let slots = construct_slots(&model, &ordered, &sessions).unwrap();
        let mut ctx = CompactionContext::new(&model, &policy, &ordered, slots);
        ctx.place_ego_block().unwrap();

        let appearances = block_appearances(&ctx);
        assert_eq!(appearances, vec![(e(1), vec![0, 1]), (e(2), vec![1])]);
    }
}
