//! Property tests over randomly generated egocentric networks.

use chrono::NaiveDate;
use proptest::prelude::*;
use storyline_kernel::policy::{min_distance, PairContext};
use storyline_kernel::{
    aligning, ordering, EntityId, InteractionEdge, LayoutPolicyV1, Minimize, NetworkBuilder,
    StorylineEngine, StorylineLayout, TimeGranularity, TimelineModel,
};

const NAMES: [&str; 7] = ["Ego", "n1", "n2", "n3", "n4", "n5", "n6"];

fn raw_edge() -> impl Strategy<Value = (usize, usize, i32, u32)> {
    (0..NAMES.len(), 0..NAMES.len(), 2018..2024i32, 1..4u32)
}

/// Edges with at least one ego interaction.
fn network() -> impl Strategy<Value = Vec<InteractionEdge>> {
    (1..NAMES.len(), 2018..2024i32, prop::collection::vec(raw_edge(), 1..24)).prop_map(
        |(first, year, raw)| {
            let date = |y: i32| NaiveDate::from_ymd_opt(y, 3, 1).unwrap();
            let mut edges = vec![InteractionEdge::new("Ego", NAMES[first], date(year), 1)];
            edges.extend(
                raw.into_iter()
                    .map(|(s, t, y, w)| InteractionEdge::new(NAMES[s], NAMES[t], date(y), w)),
            );
            edges
        },
    )
}

fn build(edges: &[InteractionEdge]) -> TimelineModel {
    NetworkBuilder::new("Ego")
        .granularity(TimeGranularity::Year)
        .build(edges)
        .unwrap()
}

fn fit(model: &TimelineModel, minimize: Minimize) -> StorylineLayout {
    StorylineEngine::new(LayoutPolicyV1::minimizing(minimize))
        .fit(model)
        .unwrap()
}

proptest! {
    #[test]
    fn ego_line_is_straight(edges in network()) {
        let model = build(&edges);
        for minimize in [Minimize::Space, Minimize::Wiggles] {
            let layout = fit(&model, minimize);
            let ego = layout.ego_height();
            prop_assert!(ego.is_some());
            for t in 0..layout.num_timestamps() {
                prop_assert_eq!(layout.height(model.ego(), t), ego);
            }
        }
    }

    #[test]
    fn heights_exist_exactly_where_entities_do(edges in network()) {
        let model = build(&edges);
        let layout = fit(&model, Minimize::Space);
        for e in 0..model.num_entities() {
            for t in 0..model.num_timestamps() {
                let entity = EntityId::new(e);
                prop_assert_eq!(
                    layout.height(entity, t).is_some(),
                    model.session_at(entity, t).is_some()
                );
            }
        }
    }

    #[test]
    fn space_objective_never_stacks_lines(edges in network()) {
        let model = build(&edges);
        let layout = fit(&model, Minimize::Space);
        for t in 0..layout.num_timestamps() {
            let mut heights: Vec<f64> = (0..layout.num_entities())
                .filter_map(|e| layout.height(EntityId::new(e), t))
                .collect();
            heights.sort_by(f64::total_cmp);
            for pair in heights.windows(2) {
                prop_assert!(pair[1] - pair[0] > 0.0);
            }
        }
    }

    #[test]
    fn ego_session_members_keep_their_spacing(edges in network()) {
        let model = build(&edges);
        for minimize in [Minimize::Space, Minimize::Wiggles] {
            let policy = LayoutPolicyV1::minimizing(minimize);
            let layout = StorylineEngine::new(policy.clone()).fit(&model).unwrap();
            for t in 0..model.num_timestamps() {
                let sid = model.session_at(model.ego(), t).unwrap();
                let session = model.session(sid).unwrap();
                let mut members: Vec<(f64, EntityId)> = model
                    .members_at(sid, t)
                    .into_iter()
                    .map(|e| (layout.height(e, t).unwrap(), e))
                    .collect();
                members.sort_by(|a, b| a.0.total_cmp(&b.0));
                for pair in members.windows(2) {
                    let (upper, lower) = (pair[0], pair[1]);
                    let required = min_distance(
                        &policy,
                        model.entity(upper.1),
                        model.entity(lower.1),
                        PairContext::Session(session),
                    );
                    prop_assert!(
                        lower.0 - upper.0 >= required - 1e-9,
                        "{:?} and {:?} are {} apart at {}, need {}",
                        upper.1, lower.1, lower.0 - upper.0, t, required
                    );
                }
            }
        }
    }

    #[test]
    fn alignment_is_monotonic_and_keeps_the_ego(edges in network()) {
        let model = build(&edges);
        let ordered = ordering(&model, 10);
        let (alignment, sessions) = aligning(&model, &ordered, 0.1);
        let ego = model.ego();

        for (t, pairs) in alignment.pairs.iter().enumerate() {
            for w in pairs.windows(2) {
                prop_assert!(w[0].0 < w[1].0 && w[0].1 < w[1].1);
            }
            prop_assert_eq!(alignment.aligned(ego, t), Some(ego));
            prop_assert_eq!(
                sessions.target(t, model.session_at(ego, t).unwrap()),
                model.session_at(ego, t + 1)
            );
        }
    }

    #[test]
    fn layouts_are_deterministic(edges in network()) {
        let first = fit(&build(&edges), Minimize::Wiggles);
        let second = fit(&build(&edges), Minimize::Wiggles);
        prop_assert_eq!(&first.layout_id, &second.layout_id);
        prop_assert_eq!(&first.heights, &second.heights);
        prop_assert!(first.verify_fingerprint());
    }

    #[test]
    fn minimum_height_is_zero(edges in network()) {
        let model = build(&edges);
        let layout = fit(&model, Minimize::Space);
        let minimum = (0..layout.num_entities())
            .flat_map(|e| (0..layout.num_timestamps()).map(move |t| (e, t)))
            .filter_map(|(e, t)| layout.height(EntityId::new(e), t))
            .fold(f64::INFINITY, f64::min);
        prop_assert_eq!(minimum, 0.0);
    }
}
