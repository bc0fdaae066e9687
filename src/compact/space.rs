//! Space objective: pack idle lines tightly against the ego block.

use std::collections::BTreeSet;
use std::ops::Range;

use super::context::{same_side, side, CompactionContext};
use crate::engine::LayoutError;
use crate::types::EntityId;

/// Consecutive idle timestamps of one entity, recorded once.
#[derive(Debug, Clone)]
struct IdleRun {
    entity: EntityId,
    columns: Range<usize>,
}

/// Assign heights minimising total height.
pub fn compact_space(ctx: &mut CompactionContext<'_>) -> Result<(), LayoutError> {
    ctx.place_ego_block()?;
    let runs = place_idle_lines(ctx)?;

    let mut stretched = 0;
    for run in &runs {
        let on_side = |above: bool| -> Vec<usize> {
            run.columns
                .clone()
                .filter(|&t| match ctx.height(run.entity, t) {
                    Some(h) if above => h < 0.0,
                    Some(h) => h > 0.0,
                    None => false,
                })
                .collect()
        };
        let (above, below) = (on_side(true), on_side(false));
        if above.len() > 1 {
            stretch(ctx, run.entity, &above, true);
            stretched += 1;
        }
        if below.len() > 1 {
            stretch(ctx, run.entity, &below, false);
            stretched += 1;
        }
    }

    tracing::debug!(idle_runs = runs.len(), stretched, "Space compaction complete");
    Ok(())
}

/// Nearest placed height of `entity` before `t`.
fn left_neighbour(ctx: &CompactionContext<'_>, entity: EntityId, t: usize) -> Option<(usize, f64)> {
    (0..t).rev().find_map(|c| ctx.height(entity, c).map(|h| (c, h)))
}

/// Nearest placed height of `entity` after `t`.
fn right_neighbour(ctx: &CompactionContext<'_>, entity: EntityId, t: usize) -> Option<(usize, f64)> {
    (t + 1..ctx.num_timestamps()).find_map(|c| ctx.height(entity, c).map(|h| (c, h)))
}

/// Outside the block at `t` (or the block is a single point) and unused.
fn available(ctx: &CompactionContext<'_>, t: usize, height: f64) -> bool {
    let (lo, hi) = ctx.block_range[t];
    let outside = height < lo || height > hi || lo == hi;
    outside && !ctx.is_used(t, height)
}

/// Place every idle slot session, top slot first, one timestamp at a time.
fn place_idle_lines(ctx: &mut CompactionContext<'_>) -> Result<Vec<IdleRun>, LayoutError> {
    let step = ctx.policy.spacing.session;
    let mut runs = Vec::new();
    let mut recorded: BTreeSet<(EntityId, usize)> = BTreeSet::new();

    for t in 0..ctx.num_timestamps() {
        for slot in 0..ctx.slots.len() {
            if slot == ctx.slots.ego_slot {
                continue;
            }
            let Some(session) = ctx.slots.session(slot, t) else {
                continue;
            };
            let members = ctx.slot_members(slot, t);
            let &[entity] = members.as_slice() else {
                tracing::error!(%session, timestamp = t, members = members.len(), "Slot session outside the ego block is not a single line");
                return Err(LayoutError::IdleSlotNotSingleton {
                    session,
                    timestamp: t,
                    members: members.len(),
                });
            };

            let above = slot < ctx.slots.ego_slot;
            let left = left_neighbour(ctx, entity, t);
            let right = right_neighbour(ctx, entity, t);

            let columns = left.map_or(t, |(c, _)| c + 1)..right.map_or(t + 1, |(c, _)| c);
            if columns.clone().all(|c| !recorded.contains(&(entity, c))) {
                recorded.extend(columns.clone().map(|c| (entity, c)));
                runs.push(IdleRun { entity, columns });
            }

            let (lo, hi) = ctx.block_range[t];
            let mut above_pos = lo;
            while ctx.is_used(t, above_pos) {
                above_pos -= step;
            }
            let mut below_pos = hi;
            while ctx.is_used(t, below_pos) {
                below_pos += step;
            }

            let left_h = left.map(|(_, h)| h);
            let right_h = right.map(|(_, h)| h);
            let slot_side = if above { -1.0 } else { 1.0 };
            let neighbours_agree = matches!((left_h, right_h), (Some(l), Some(r)) if same_side(l, r));

            let assignment = match left_h {
                Some(l) if neighbours_agree && side(l) != slot_side => {
                    if side(l) < 0.0 {
                        above_pos
                    } else {
                        below_pos
                    }
                }
                _ => {
                    let mut assignment = if above { above_pos } else { below_pos };
                    for neighbour in [left_h, right_h].into_iter().flatten() {
                        if same_side(assignment, neighbour) && available(ctx, t, neighbour) {
                            assignment = neighbour;
                        }
                    }
                    assignment
                }
            };
            ctx.set_height(entity, t, assignment);
        }
    }
    Ok(runs)
}

/// Give one side of an idle run a single height.
///
/// Tries the run's own heights closest to the ego first, then walks outward
/// from the block edge by the session step.
fn stretch(ctx: &mut CompactionContext<'_>, entity: EntityId, columns: &[usize], above: bool) {
    let heights: Vec<f64> = columns.iter().filter_map(|&t| ctx.height(entity, t)).collect();
    let mut candidates = heights.clone();
    candidates.sort_by(f64::total_cmp);
    candidates.dedup();
    if above {
        candidates.reverse();
    }

    let fits = |ctx: &CompactionContext<'_>, height: f64| {
        columns.iter().all(|&t| {
            let (lo, hi) = ctx.block_range[t];
            (height < lo || height > hi) && !ctx.is_used_by_other(t, height, entity)
        })
    };

    let chosen = match candidates.iter().copied().find(|&h| fits(ctx, h)) {
        Some(h) => h,
        None => {
            let step = if above { -ctx.policy.spacing.session } else { ctx.policy.spacing.session };
            let mut height = if above {
                heights.iter().copied().fold(f64::INFINITY, f64::min)
            } else {
                heights.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            };
            while !fits(ctx, height) {
                height += step;
            }
            height
        }
    };

    for &t in columns {
        ctx.set_height(entity, t, chosen);
    }
}
