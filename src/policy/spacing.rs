//! Minimum vertical spacing between two adjacent lines.

use crate::types::{Entity, HopBucket, Session};
use super::v1::LayoutPolicyV1;

/// Where two adjacent lines meet.
#[derive(Debug, Clone, Copy)]
pub enum PairContext<'a> {
    /// At least one of them is (or becomes) an idle placeholder.
    Idle,
    /// No session constraints apply.
    Unconstrained,
    /// Both are members of this contact session.
    Session(&'a Session),
}

/// How two members of a session relate by hop bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRelation {
    /// Same bucket.
    Same,
    /// Different buckets, ego not involved (or more than two levels apart).
    Different,
    /// The ego and a one-hop neighbour.
    EgoOneLevel,
    /// The ego and a two-hop neighbour.
    EgoTwoLevel,
}

/// Relation between the buckets of `a` and `b` inside `session`.
pub fn identity_relation(session: &Session, a: &Entity, b: &Entity) -> IdentityRelation {
    let first = session.identity(a.id);
    let second = session.identity(b.id);
    if first == second {
        return IdentityRelation::Same;
    }
    let involves_ego = first == Some(HopBucket::Ego) || second == Some(HopBucket::Ego);
    match (first, second) {
        (Some(x), Some(y)) if involves_ego => match (x.level() - y.level()).abs() {
            1 => IdentityRelation::EgoOneLevel,
            2 => IdentityRelation::EgoTwoLevel,
            _ => IdentityRelation::Different,
        },
        _ => IdentityRelation::Different,
    }
}

/// Minimum distance between `a` and `b` when drawn next to each other.
///
/// ```text
/// base            = line
/// same category   → squeeze
/// idle context    → squeeze
/// session context → hop if buckets differ, line for ego and a one-hop
/// ```
pub fn min_distance(policy: &LayoutPolicyV1, a: &Entity, b: &Entity, context: PairContext<'_>) -> f64 {
    let squeeze = policy.squeeze_distance();
    let base = if a.shares_category(b) { squeeze } else { policy.spacing.line };

    match context {
        PairContext::Idle => squeeze,
        PairContext::Unconstrained => base,
        PairContext::Session(session) => match identity_relation(session, a, b) {
            IdentityRelation::Same => base,
            IdentityRelation::Different | IdentityRelation::EgoTwoLevel => policy.spacing.hop,
            IdentityRelation::EgoOneLevel => policy.spacing.line,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityId, HopPartition, SessionId, WeightGroup};

    fn entity(i: usize, category: Option<&str>) -> Entity {
        Entity::new(EntityId::new(i), format!("n{i}")).with_category(category.map(String::from))
    }

    fn session() -> Session {
        // top: 0, sources: 1 and 2, ego: 3, targets: 4, bottom: 5
        let hops = HopPartition {
            top_two_hop: vec![EntityId::new(0)],
            sources: vec![WeightGroup::new(1, vec![EntityId::new(1), EntityId::new(2)])],
            ego: EntityId::new(3),
            targets: vec![WeightGroup::new(1, vec![EntityId::new(4)])],
            bottom_two_hop: vec![EntityId::new(5)],
        };
        Session::contact(SessionId::new(1), 0, hops, Vec::new())
    }

    #[test]
    fn test_hop_boundaries() {
        let policy = LayoutPolicyV1::default();
        let s = session();
        let ctx = PairContext::Session(&s);

        // two-hop next to one-hop
        assert_eq!(min_distance(&policy, &entity(0, None), &entity(1, None), ctx), 10.0);
        // same bucket
        assert_eq!(min_distance(&policy, &entity(1, None), &entity(2, None), ctx), 5.0);
        // ego next to a one-hop
        assert_eq!(min_distance(&policy, &entity(2, None), &entity(3, None), ctx), 5.0);
        // ego next to a two-hop
        assert_eq!(min_distance(&policy, &entity(3, None), &entity(5, None), ctx), 10.0);
    }

    #[test]
    fn test_category_squeeze() {
        let mut policy = LayoutPolicyV1::default();
        policy.squeeze_same_category = true;
        let a = entity(1, Some("red"));
        let b = entity(2, Some("red"));
        let s = session();

        assert_eq!(min_distance(&policy, &a, &b, PairContext::Unconstrained), 2.0);
        assert_eq!(min_distance(&policy, &a, &b, PairContext::Session(&s)), 2.0);
        // different buckets override the squeeze
        let c = entity(0, Some("red"));
        assert_eq!(min_distance(&policy, &c, &a, PairContext::Session(&s)), 10.0);
    }

    #[test]
    fn test_idle_uses_squeeze() {
        let mut policy = LayoutPolicyV1::default();
        assert_eq!(min_distance(&policy, &entity(0, None), &entity(1, None), PairContext::Idle), 5.0);
        policy.squeeze_same_category = true;
        assert_eq!(min_distance(&policy, &entity(0, None), &entity(1, None), PairContext::Idle), 2.0);
    }
}
