//! Derivation of the hop partition of a contact session from its links.

use crate::types::{Entity, EntityId, HopPartition, Link, WeightGroup};

/// Drop one direction of every reciprocal pair.
///
/// The heavier direction wins; on equal weights the first-seen one stays.
/// Self-loops are dropped.
pub fn resolve_reciprocal(links: &[Link]) -> Vec<Link> {
    let mut kept: Vec<Link> = Vec::with_capacity(links.len());
    for link in links.iter().filter(|l| l.source != l.target) {
        let reverse = kept
            .iter()
            .position(|k| k.source == link.target && k.target == link.source);
        match reverse {
            Some(idx) if kept[idx].weight >= link.weight => continue,
            Some(idx) => {
                kept.remove(idx);
                kept.push(link.clone());
            }
            None => kept.push(link.clone()),
        }
    }
    kept
}

/// Group one-hop neighbours by equal weight.
///
/// Groups are sorted by weight (ascending for sources, descending for
/// targets); members of a group are sorted by category and every odd group
/// is reversed, so equal categories meet across group boundaries.
fn weight_groups(mut pairs: Vec<(EntityId, u32)>, ascending: bool, entities: &[Entity]) -> Vec<WeightGroup> {
    if ascending {
        pairs.sort_by_key(|&(_, w)| w);
    } else {
        pairs.sort_by_key(|&(_, w)| std::cmp::Reverse(w));
    }

    let mut groups: Vec<WeightGroup> = Vec::new();
    for (entity, weight) in pairs {
        match groups.last_mut() {
            Some(group) if group.weight == weight => group.members.push(entity),
            _ => groups.push(WeightGroup::new(weight, vec![entity])),
        }
    }
    for (idx, group) in groups.iter_mut().enumerate() {
        group.members.sort_by(|a, b| entities[a.index()].category.cmp(&entities[b.index()].category));
        if idx % 2 == 1 {
            group.members.reverse();
        }
    }
    groups
}

/// Hop partition of a contact session around `ego`.
///
/// `links` are the aggregated links of the session in first-seen order.
pub fn derive_hops(ego: EntityId, links: &[Link], entities: &[Entity]) -> HopPartition {
    let constraints = resolve_reciprocal(links);

    let source_pairs: Vec<(EntityId, u32)> = constraints
        .iter()
        .filter(|l| l.target == ego)
        .map(|l| (l.source, l.weight))
        .collect();
    let target_pairs: Vec<(EntityId, u32)> = constraints
        .iter()
        .filter(|l| l.source == ego)
        .map(|l| (l.target, l.weight))
        .collect();

    let sources = weight_groups(source_pairs, true, entities);
    let targets = weight_groups(target_pairs, false, entities);
    let in_sources = |e: EntityId| sources.iter().any(|g| g.members.contains(&e));
    let in_targets = |e: EntityId| targets.iter().any(|g| g.members.contains(&e));
    let is_one_hop = |e: EntityId| in_sources(e) || in_targets(e);

    let mut remaining: Vec<&Link> = constraints
        .iter()
        .filter(|l| l.source != ego && l.target != ego)
        .collect();
    remaining.sort_by_key(|l| std::cmp::Reverse(l.weight));

    let mut top_two_hop: Vec<EntityId> = Vec::new();
    let mut bottom_two_hop: Vec<EntityId> = Vec::new();
    for link in remaining {
        let (anchor, two_hop) = match (is_one_hop(link.source), is_one_hop(link.target)) {
            (false, true) => (link.target, link.source),
            (true, false) => (link.source, link.target),
            _ => continue,
        };
        if top_two_hop.contains(&two_hop) || bottom_two_hop.contains(&two_hop) {
            continue;
        }
        if in_sources(anchor) {
            top_two_hop.push(two_hop);
        } else if in_targets(anchor) {
            bottom_two_hop.push(two_hop);
        }
    }

    HopPartition {
        top_two_hop,
        sources,
        ego,
        targets,
        bottom_two_hop,
    }
}
