//! LayoutPolicy v1: ordering, alignment and compaction parameters.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Floats are quantized to integers before hashing (multiply by 1e6 and
//! round to i64), so `params_hash` does not depend on float formatting.

use serde::{Deserialize, Serialize};
use crate::canonical::{canonical_hash_hex, quantize_f64};
use crate::DEFAULT_POLICY_VERSION;

/// Objective of the compaction stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Minimize {
    /// Pack idle lines tightly against the ego block.
    #[default]
    Space,
    /// Keep lines straight across timestamps, accepting extra height.
    Wiggles,
}

/// Minimum vertical distances between adjacent lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpacingRules {
    /// Base distance between two lines.
    pub line: f64,
    /// Distance between lines in different hop buckets.
    pub hop: f64,
    /// Step used when searching free heights outside the ego block.
    pub session: f64,
    /// Distance for squeezed pairs (same category or idle).
    pub squeeze: f64,
    /// Squeeze distance used when `squeeze_same_category` is on.
    pub squeezed_category: f64,
}

impl Default for SpacingRules {
    fn default() -> Self {
        Self {
            line: 5.0,
            hop: 10.0,
            session: 5.0,
            squeeze: 5.0,
            squeezed_category: 2.0,
        }
    }
}

impl SpacingRules {
    fn to_quantized(&self) -> QuantizedSpacing {
        QuantizedSpacing {
            line: quantize_f64(self.line),
            hop: quantize_f64(self.hop),
            session: quantize_f64(self.session),
            squeeze: quantize_f64(self.squeeze),
            squeezed_category: quantize_f64(self.squeezed_category),
        }
    }
}

/// Heuristic thresholds of the wiggle resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionThresholds {
    /// Two placements closer than this are considered the same slot.
    pub shared_slot_tolerance: f64,
    /// Largest jump from the current height a contact line may take.
    pub max_jump: f64,
    /// Clearance kept around an inserted idle line.
    pub idle_clearance: f64,
    /// Gap needed between the movable and dealt part for a whole-block push.
    pub block_push_margin: f64,
    /// Radius of a single point when measuring a block range.
    pub point_radius: f64,
    /// Attempts of the alternating insertion search.
    pub insertion_retries: usize,
}

impl Default for CompactionThresholds {
    fn default() -> Self {
        Self {
            shared_slot_tolerance: 1.75,
            max_jump: 50.0,
            idle_clearance: 2.0,
            block_push_margin: 5.0,
            point_radius: 2.0,
            insertion_retries: 10,
        }
    }
}

impl CompactionThresholds {
    fn to_quantized(&self) -> QuantizedThresholds {
        QuantizedThresholds {
            shared_slot_tolerance: quantize_f64(self.shared_slot_tolerance),
            max_jump: quantize_f64(self.max_jump),
            idle_clearance: quantize_f64(self.idle_clearance),
            block_push_margin: quantize_f64(self.block_push_margin),
            point_radius: quantize_f64(self.point_radius),
            insertion_retries: self.insertion_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuantizedSpacing {
    line: i64,
    hop: i64,
    session: i64,
    squeeze: i64,
    squeezed_category: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuantizedThresholds {
    shared_slot_tolerance: i64,
    max_jump: i64,
    idle_clearance: i64,
    block_push_margin: i64,
    point_radius: i64,
    insertion_retries: usize,
}

/// Quantized policy parameters for deterministic hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuantizedPolicyParams {
    version: String,
    minimize: Minimize,
    squeeze_same_category: bool,
    sweep_iterations: usize,
    order_similarity_weight: i64,
    spacing: QuantizedSpacing,
    thresholds: QuantizedThresholds,
}

/// Layout policy version 1.
///
/// ## Parameters
///
/// - `minimize`: Compaction objective (space or wiggles)
/// - `squeeze_same_category`: Pack same-category lines at `squeezed_category`
/// - `sweep_iterations`: Barycenter sweeps (each sweep is forward then backward)
/// - `order_similarity_weight`: Weight of relative position in alignment rewards
/// - `spacing`: Minimum distances between lines
/// - `thresholds`: Wiggle resolver heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutPolicyV1 {
    /// Policy version identifier.
    pub version: String,
    /// Compaction objective.
    pub minimize: Minimize,
    /// Whether same-category lines use the tighter squeeze distance.
    pub squeeze_same_category: bool,
    /// Number of forward/backward sweeps.
    pub sweep_iterations: usize,
    /// Weight of the order similarity term.
    pub order_similarity_weight: f64,
    /// Spacing rules.
    pub spacing: SpacingRules,
    /// Compaction thresholds.
    pub thresholds: CompactionThresholds,
}

impl LayoutPolicyV1 {
    /// Default policy with another objective.
    pub fn minimizing(minimize: Minimize) -> Self {
        Self {
            minimize,
            ..Self::default()
        }
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Distance used for squeezed pairs under this policy.
    pub fn squeeze_distance(&self) -> f64 {
        if self.squeeze_same_category {
            self.spacing.squeezed_category
        } else {
            self.spacing.squeeze
        }
    }

    /// Compute a hash of the policy parameters.
    ///
    /// Uses the quantized float representation, see the module docs.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&self.to_quantized())
    }

    fn to_quantized(&self) -> QuantizedPolicyParams {
        QuantizedPolicyParams {
            version: self.version.clone(),
            minimize: self.minimize,
            squeeze_same_category: self.squeeze_same_category,
            sweep_iterations: self.sweep_iterations,
            order_similarity_weight: quantize_f64(self.order_similarity_weight),
            spacing: self.spacing.to_quantized(),
            thresholds: self.thresholds.to_quantized(),
        }
    }
}

impl Default for LayoutPolicyV1 {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            minimize: Minimize::Space,
            squeeze_same_category: false,
            sweep_iterations: 10,
            order_similarity_weight: 0.1,
            spacing: SpacingRules::default(),
            thresholds: CompactionThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_params_hash_determinism() {
        let policy1 = LayoutPolicyV1::default();
        let policy2 = LayoutPolicyV1::default();

        assert_eq!(policy1.params_hash(), policy2.params_hash());
    }

    #[test]
    fn test_policy_params_hash_changes() {
        let policy1 = LayoutPolicyV1::default();
        let policy2 = LayoutPolicyV1::minimizing(Minimize::Wiggles);
        assert_ne!(policy1.params_hash(), policy2.params_hash());

        let mut policy3 = LayoutPolicyV1::default();
        policy3.thresholds.shared_slot_tolerance = 1.5;
        assert_ne!(policy1.params_hash(), policy3.params_hash());
    }

    #[test]
    fn test_squeeze_distance() {
        let mut policy = LayoutPolicyV1::default();
        assert_eq!(policy.squeeze_distance(), 5.0);
        policy.squeeze_same_category = true;
        assert_eq!(policy.squeeze_distance(), 2.0);
    }
}
