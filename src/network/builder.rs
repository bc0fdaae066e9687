//! Builds a [`TimelineModel`] from raw timestamped edges.
//!
//! ## Pipeline
//!
//! ```text
//! edges → ego filter → extents → 2-hop traversal → buckets
//!       → contact sessions (hop partitions) → idle gap filling
//!       → effective timestamps → TimelineModel
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::bucket::{TimeBuckets, TimeGranularity};
use super::constraints::derive_hops;
use super::edge::InteractionEdge;
use crate::types::{
    Entity, EntityId, Grid, HopPartition, Link, ModelError, Session, SessionId, TimelineModel,
    WeightGroup,
};

/// Maximum distance from the ego included in the network.
pub const HOP_LIMIT: usize = 2;

/// Error raised while building a timeline model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    /// No edges were given.
    #[error("No edges given")]
    EmptyInput,
    /// The ego does not interact with anyone in range.
    #[error("Ego '{0}' not found in the data with the given time range")]
    EgoNotFound(String),
    /// Start after end, or out of the calendar range.
    #[error("Invalid time extents {start} .. {end}")]
    InvalidExtents {
        /// Start date.
        start: NaiveDate,
        /// End date.
        end: NaiveDate,
    },
    /// A group override names an entity that is not part of the network.
    #[error("Group override for '{label}' names unknown entity '{name}'")]
    UnknownOverrideEntity {
        /// Bucket label of the override.
        label: String,
        /// Unknown name.
        name: String,
    },
    /// The assembled model is inconsistent.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Explicit hop partition for one bucket, by entity name.
///
/// Source and target groups become a single weight group each; the ego is
/// placed between them implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOverride {
    /// Two-hop neighbours above.
    pub top_two_hop: Vec<String>,
    /// Sources.
    pub sources: Vec<String>,
    /// Targets.
    pub targets: Vec<String>,
    /// Two-hop neighbours below.
    pub bottom_two_hop: Vec<String>,
}

/// Builder for an egocentric timeline model.
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    ego: String,
    granularity: TimeGranularity,
    extents: Option<(NaiveDate, NaiveDate)>,
    categories: BTreeMap<String, String>,
    groups: BTreeMap<String, GroupOverride>,
}

impl NetworkBuilder {
    /// Create a builder centred on `ego`.
    pub fn new(ego: impl Into<String>) -> Self {
        Self {
            ego: ego.into(),
            granularity: TimeGranularity::default(),
            extents: None,
            categories: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Set the time granularity.
    pub fn granularity(mut self, granularity: TimeGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Restrict to `[start, end]` instead of the data's own range.
    pub fn extents(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.extents = Some((start, end));
        self
    }

    /// Tag an entity with a category.
    pub fn category(mut self, name: impl Into<String>, category: impl Into<String>) -> Self {
        self.categories.insert(name.into(), category.into());
        self
    }

    /// Override the hop partition of the bucket labelled `label`.
    pub fn group_override(mut self, label: impl Into<String>, groups: GroupOverride) -> Self {
        self.groups.insert(label.into(), groups);
        self
    }

    /// Build the model.
    pub fn build(&self, edges: &[InteractionEdge]) -> Result<TimelineModel, NetworkError> {
        if edges.is_empty() {
            return Err(NetworkError::EmptyInput);
        }

        let edges = self.filter_by_ego(edges);
        if edges.is_empty() {
            return Err(NetworkError::EgoNotFound(self.ego.clone()));
        }

        let (start, end) = match self.extents {
            Some(extents) => extents,
            None => {
                let min = edges.iter().map(|e| e.time).min();
                let max = edges.iter().map(|e| e.time).max();
                match (min, max) {
                    (Some(min), Some(max)) => (min, max),
                    _ => return Err(NetworkError::EgoNotFound(self.ego.clone())),
                }
            }
        };
        let buckets = TimeBuckets::new(self.granularity, start, end)?;

        let in_range: Vec<&InteractionEdge> = edges
            .into_iter()
            .filter(|e| start <= e.time && e.time <= end)
            .collect();
        let network = self.egocentric_network(&in_range);
        if !network.iter().any(|e| e.touches(&self.ego)) {
            return Err(NetworkError::EgoNotFound(self.ego.clone()));
        }

        let (entities, index) = self.construct_entities(&network);
        let ego = index
            .get(self.ego.as_str())
            .copied()
            .ok_or_else(|| NetworkError::EgoNotFound(self.ego.clone()))?;

        let contacts = self.construct_contact_sessions(&network, &buckets, &entities, &index, ego)?;
        let (table, idle) = construct_timelines(entities.len(), buckets.len(), &contacts);

        let (table, keep) = effective_columns(&table);
        let labels: Vec<String> = keep.iter().map(|&b| buckets.label(b)).collect();
        let column_of: BTreeMap<usize, usize> = keep.iter().enumerate().map(|(c, &b)| (b, c)).collect();

        let mut sessions: Vec<Session> = Vec::with_capacity(contacts.len() + idle.len());
        for (position, (bucket, hops, links)) in contacts.into_iter().enumerate() {
            let Some(&column) = column_of.get(&bucket) else {
                continue;
            };
            let id = SessionId::new(position as u32 + 1);
            sessions.push(Session::contact(id, column, hops, links));
        }
        sessions.extend(idle);

        tracing::debug!(
            ego = %self.ego,
            entities = entities.len(),
            buckets = buckets.len(),
            timestamps = labels.len(),
            sessions = sessions.len(),
            "Built egocentric timeline"
        );

        Ok(TimelineModel::new(entities, labels, ego, sessions, table)?)
    }

    /// Keep only edges at raw times where the ego interacts. Self-loops are dropped.
    fn filter_by_ego<'a>(&self, edges: &'a [InteractionEdge]) -> Vec<&'a InteractionEdge> {
        let times: BTreeSet<NaiveDate> = edges
            .iter()
            .filter(|e| e.touches(&self.ego))
            .map(|e| e.time)
            .collect();
        edges
            .iter()
            .filter(|e| !e.is_self_loop() && times.contains(&e.time))
            .collect()
    }

    /// Per raw time, keep edges within two hops of the ego, in input order.
    fn egocentric_network<'a>(&self, edges: &[&'a InteractionEdge]) -> Vec<&'a InteractionEdge> {
        let mut by_time: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (idx, edge) in edges.iter().enumerate() {
            by_time.entry(edge.time).or_default().push(idx);
        }

        let mut kept: BTreeSet<usize> = BTreeSet::new();
        for indices in by_time.values() {
            let mut waitlist: BTreeSet<&str> = BTreeSet::from([self.ego.as_str()]);
            let mut hop = 1;
            while !waitlist.is_empty() && hop <= HOP_LIMIT {
                let mut next: BTreeSet<&str> = BTreeSet::new();
                for node in &waitlist {
                    for &idx in indices {
                        if let Some(other) = edges[idx].other(node) {
                            kept.insert(idx);
                            next.insert(other);
                        }
                    }
                }
                waitlist = next.difference(&waitlist).copied().collect();
                hop += 1;
            }
        }
        kept.into_iter().map(|idx| edges[idx]).collect()
    }

    /// Unique entities in order of first appearance, source before target.
    fn construct_entities<'a>(
        &self,
        network: &[&'a InteractionEdge],
    ) -> (Vec<Entity>, BTreeMap<&'a str, EntityId>) {
        let mut entities: Vec<Entity> = Vec::new();
        let mut index: BTreeMap<&'a str, EntityId> = BTreeMap::new();
        for edge in network {
            for name in [edge.source.as_str(), edge.target.as_str()] {
                if index.contains_key(name) {
                    continue;
                }
                let id = EntityId::new(entities.len());
                index.insert(name, id);
                entities.push(Entity::new(id, name).with_category(self.categories.get(name).cloned()));
            }
        }
        (entities, index)
    }

    /// One contact session per non-empty bucket: `(bucket, hops, links)`.
    fn construct_contact_sessions(
        &self,
        network: &[&InteractionEdge],
        buckets: &TimeBuckets,
        entities: &[Entity],
        index: &BTreeMap<&str, EntityId>,
        ego: EntityId,
    ) -> Result<Vec<(usize, HopPartition, Vec<Link>)>, NetworkError> {
        let mut per_bucket: BTreeMap<usize, Vec<Link>> = BTreeMap::new();
        for edge in network {
            let Some(bucket) = buckets.bucket_of(edge.time) else {
                continue;
            };
            let links = per_bucket.entry(bucket).or_default();
            let source = index[edge.source.as_str()];
            let target = index[edge.target.as_str()];
            match links.iter_mut().find(|l| l.source == source && l.target == target) {
                Some(link) => link.weight += edge.weight,
                None => links.push(Link { source, target, weight: edge.weight }),
            }
        }

        let mut sessions = Vec::with_capacity(per_bucket.len());
        for (bucket, links) in per_bucket {
            let label = buckets.label(bucket);
            let hops = match self.groups.get(&label) {
                Some(groups) => resolve_override(&label, groups, index, ego)?,
                None => derive_hops(ego, &links, entities),
            };
            sessions.push((bucket, hops, links));
        }
        Ok(sessions)
    }
}

fn resolve_override(
    label: &str,
    groups: &GroupOverride,
    index: &BTreeMap<&str, EntityId>,
    ego: EntityId,
) -> Result<HopPartition, NetworkError> {
    let lookup = |names: &[String]| -> Result<Vec<EntityId>, NetworkError> {
        names
            .iter()
            .map(|name| {
                index.get(name.as_str()).copied().ok_or_else(|| NetworkError::UnknownOverrideEntity {
                    label: label.to_string(),
                    name: name.clone(),
                })
            })
            .collect()
    };
    let single_group = |members: Vec<EntityId>| {
        if members.is_empty() {
            Vec::new()
        } else {
            vec![WeightGroup::new(1, members)]
        }
    };

    Ok(HopPartition {
        top_two_hop: lookup(&groups.top_two_hop)?,
        sources: single_group(lookup(&groups.sources)?),
        ego,
        targets: single_group(lookup(&groups.targets)?),
        bottom_two_hop: lookup(&groups.bottom_two_hop)?,
    })
}

/// Session table over all buckets plus the idle sessions filling gaps.
///
/// Contact sessions are numbered 1.. in bucket order; idle ids continue
/// after the last contact id, one per gap.
fn construct_timelines(
    num_entities: usize,
    num_buckets: usize,
    contacts: &[(usize, HopPartition, Vec<Link>)],
) -> (Grid<Option<SessionId>>, Vec<Session>) {
    let mut table: Grid<Option<SessionId>> = Grid::filled(num_entities, num_buckets, None);
    let mut last_seen: Vec<Option<usize>> = vec![None; num_entities];
    let mut idle: Vec<Session> = Vec::new();
    let mut next_idle = contacts.len() as u32 + 1;

    for (position, (bucket, hops, _)) in contacts.iter().enumerate() {
        let session = SessionId::new(position as u32 + 1);
        for entity in hops.members() {
            let row = entity.index();
            if let Some(last) = last_seen[row] {
                if bucket - last > 1 {
                    let id = SessionId::new(next_idle);
                    next_idle += 1;
                    for column in last + 1..*bucket {
                        table.set(row, column, Some(id));
                    }
                    idle.push(Session::idle(id, entity));
                }
            }
            table.set(row, *bucket, Some(session));
            last_seen[row] = Some(*bucket);
        }
    }
    (table, idle)
}

/// Drop empty columns and columns identical to an earlier one.
///
/// Returns the reduced table and the kept bucket indices.
fn effective_columns(table: &Grid<Option<SessionId>>) -> (Grid<Option<SessionId>>, Vec<usize>) {
    let mut seen: BTreeSet<Vec<Option<SessionId>>> = BTreeSet::new();
    let mut keep: Vec<usize> = Vec::new();
    for column in 0..table.columns() {
        let cells = table.column(column);
        if cells.iter().all(Option::is_none) {
            continue;
        }
        if seen.insert(cells) {
            keep.push(column);
        }
    }
    (table.select_columns(&keep), keep)
}
