//! Session types: groups of entities co-present at a timestamp.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::EntityId;

/// Identifier of a session.
///
/// Contact sessions are numbered first, idle sessions continue after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u32);

impl SessionId {
    /// Create a session id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Kind of session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    /// Real interaction at one timestamp.
    Contact,
    /// Synthetic single-member placeholder filling a timeline gap.
    Idle,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contact => write!(f, "contact"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// The five ordered hop buckets of a contact session, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HopBucket {
    /// Two-hop neighbours reached through a source.
    TopTwoHop,
    /// One-hop neighbours pointing at the ego.
    Source,
    /// The ego itself.
    Ego,
    /// One-hop neighbours the ego points at.
    Target,
    /// Two-hop neighbours reached through a target.
    BottomTwoHop,
}

impl HopBucket {
    /// Numeric level, 0 (top) to 4 (bottom). The ego sits at 2.
    pub fn level(&self) -> i32 {
        match self {
            Self::TopTwoHop => 0,
            Self::Source => 1,
            Self::Ego => 2,
            Self::Target => 3,
            Self::BottomTwoHop => 4,
        }
    }
}

/// One-hop neighbours sharing the same link weight with the ego.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightGroup {
    /// Shared link weight.
    pub weight: u32,
    /// Members in their declared order.
    pub members: Vec<EntityId>,
}

impl WeightGroup {
    /// Create a weight group.
    pub fn new(weight: u32, members: Vec<EntityId>) -> Self {
        Self { weight, members }
    }
}

/// Hop partition of a contact session.
///
/// The member order of a contact session is exactly the concatenation of
/// these buckets, so every bucket maps onto a contiguous member range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopPartition {
    /// Two-hop neighbours drawn above the sources.
    pub top_two_hop: Vec<EntityId>,
    /// Source neighbours, grouped by weight.
    pub sources: Vec<WeightGroup>,
    /// The ego.
    pub ego: EntityId,
    /// Target neighbours, grouped by weight.
    pub targets: Vec<WeightGroup>,
    /// Two-hop neighbours drawn below the targets.
    pub bottom_two_hop: Vec<EntityId>,
}

impl HopPartition {
    /// Partition containing only the ego.
    pub fn ego_only(ego: EntityId) -> Self {
        Self {
            top_two_hop: Vec::new(),
            sources: Vec::new(),
            ego,
            targets: Vec::new(),
            bottom_two_hop: Vec::new(),
        }
    }

    /// Sub-groups in sweep order: top two-hop, each source group, the ego,
    /// each target group, bottom two-hop.
    pub fn groups(&self) -> Vec<&[EntityId]> {
        let mut groups: Vec<&[EntityId]> = Vec::with_capacity(self.sources.len() + self.targets.len() + 3);
        groups.push(&self.top_two_hop);
        groups.extend(self.sources.iter().map(|g| g.members.as_slice()));
        groups.push(std::slice::from_ref(&self.ego));
        groups.extend(self.targets.iter().map(|g| g.members.as_slice()));
        groups.push(&self.bottom_two_hop);
        groups
    }

    /// Flattened member order.
    pub fn members(&self) -> Vec<EntityId> {
        self.groups().into_iter().flatten().copied().collect()
    }

    /// Bucket holding `entity`, if any.
    pub fn bucket_of(&self, entity: EntityId) -> Option<HopBucket> {
        if self.top_two_hop.contains(&entity) {
            Some(HopBucket::TopTwoHop)
        } else if self.sources.iter().any(|g| g.members.contains(&entity)) {
            Some(HopBucket::Source)
        } else if self.ego == entity {
            Some(HopBucket::Ego)
        } else if self.targets.iter().any(|g| g.members.contains(&entity)) {
            Some(HopBucket::Target)
        } else if self.bottom_two_hop.contains(&entity) {
            Some(HopBucket::BottomTwoHop)
        } else {
            None
        }
    }
}

/// A weighted directed link observed inside a contact session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Source entity.
    pub source: EntityId,
    /// Target entity.
    pub target: EntityId,
    /// Aggregated weight.
    pub weight: u32,
}

/// A group of entities co-present at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Contact or idle.
    pub kind: SessionKind,
    /// Column of a contact session. Idle sessions may span several columns.
    pub timestamp: Option<usize>,
    members: Vec<EntityId>,
    hops: Option<HopPartition>,
    /// Weighted links of a contact session.
    pub links: Vec<Link>,
}

impl Session {
    /// Create a contact session; members follow the hop partition.
    pub fn contact(id: SessionId, timestamp: usize, hops: HopPartition, links: Vec<Link>) -> Self {
        Self {
            id,
            kind: SessionKind::Contact,
            timestamp: Some(timestamp),
            members: hops.members(),
            hops: Some(hops),
            links,
        }
    }

    /// Create an idle session for a single entity.
    pub fn idle(id: SessionId, entity: EntityId) -> Self {
        Self {
            id,
            kind: SessionKind::Idle,
            timestamp: None,
            members: vec![entity],
            hops: None,
            links: Vec::new(),
        }
    }

    /// Ordered members.
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    /// Hop partition; `None` for sessions without internal constraints.
    pub fn hops(&self) -> Option<&HopPartition> {
        self.hops.as_ref()
    }

    /// Whether this is an idle placeholder.
    pub fn is_idle(&self) -> bool {
        self.kind == SessionKind::Idle
    }

    /// Whether `entity` is a member.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(&entity)
    }

    /// Hop bucket of `entity` inside this session.
    pub fn identity(&self, entity: EntityId) -> Option<HopBucket> {
        self.hops.as_ref().and_then(|h| h.bucket_of(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(i: usize) -> EntityId {
        EntityId::new(i)
    }

    fn partition() -> HopPartition {
        HopPartition {
            top_two_hop: vec![e(0)],
            sources: vec![WeightGroup::new(1, vec![e(1), e(2)]), WeightGroup::new(5, vec![e(3)])],
            ego: e(4),
            targets: vec![WeightGroup::new(1, vec![e(5)])],
            bottom_two_hop: vec![e(6), e(7)],
        }
    }

    #[test]
    fn test_members_follow_bucket_order() {
        let session = Session::contact(SessionId::new(1), 0, partition(), Vec::new());
        let ids: Vec<usize> = session.members().iter().map(EntityId::index).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_groups_in_sweep_order() {
        let hops = partition();
        let sizes: Vec<usize> = hops.groups().iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![1, 2, 1, 1, 1, 2]);
    }

    #[test]
    fn test_identity_lookup() {
        let session = Session::contact(SessionId::new(1), 0, partition(), Vec::new());
        assert_eq!(session.identity(e(0)), Some(HopBucket::TopTwoHop));
        assert_eq!(session.identity(e(3)), Some(HopBucket::Source));
        assert_eq!(session.identity(e(4)), Some(HopBucket::Ego));
        assert_eq!(session.identity(e(7)), Some(HopBucket::BottomTwoHop));
        assert_eq!(session.identity(e(9)), None);
        assert_eq!(HopBucket::Ego.level(), 2);
    }

    #[test]
    fn test_idle_session_has_no_constraints() {
        let session = Session::idle(SessionId::new(9), e(3));
        assert!(session.is_idle());
        assert!(session.hops().is_none());
        assert_eq!(session.members(), &[e(3)]);
    }
}
