//! Per-node TSC label diff
//!
//! Computes which frequency scheduling labels a node has to gain or lose so
//! that it advertises exactly the frequencies it can serve from the required
//! set. Everything here is pure: the result depends only on the arguments.

use crate::node::{Frequency, Node, LABEL_TRUE};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which required frequencies a scalable node may present
///
/// The native frequency is always presentable, whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingPolicy {
    /// Any required frequency less than or equal to the native one
    #[default]
    AtOrBelowNative,
    /// Only required frequencies strictly below the native one
    BelowNative,
}

impl ScalingPolicy {
    fn can_present(self, freq: Frequency, native: Frequency) -> bool {
        match self {
            ScalingPolicy::AtOrBelowNative => freq <= native,
            ScalingPolicy::BelowNative => freq < native,
        }
    }
}

/// Labels to add and remove on one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDiff {
    pub to_add: BTreeSet<Frequency>,
    pub to_remove: BTreeSet<Frequency>,
}

impl LabelDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Label keys to set to `"true"`
    pub fn add_labels(&self) -> Vec<String> {
        self.to_add.iter().map(Frequency::to_label).collect()
    }

    /// Label keys to delete
    pub fn remove_labels(&self) -> Vec<String> {
        self.to_remove.iter().map(Frequency::to_label).collect()
    }

    /// Apply the diff to a node's labels in place
    pub fn apply(&self, node: &mut Node) {
        let labels = node.labels_mut();
        for key in self.add_labels() {
            labels.insert(key, LABEL_TRUE);
        }
        for key in self.remove_labels() {
            labels.remove(&key);
        }
    }
}

/// Frequencies a node should advertise
pub fn desired_frequencies(
    required: &BTreeSet<Frequency>,
    native: Frequency,
    scalable: bool,
    policy: ScalingPolicy,
) -> BTreeSet<Frequency> {
    let mut desired: BTreeSet<Frequency> = required
        .iter()
        .copied()
        .filter(|&freq| scalable && policy.can_present(freq, native))
        .collect();
    desired.insert(native);
    desired
}

/// Compute the label diff for one node
///
/// # Arguments
/// * `required` - Frequencies required somewhere in the cluster
/// * `on_node` - Frequencies the node currently advertises
/// * `native` - The node's measured frequency
/// * `scalable` - Whether the node can present lower frequencies
/// * `policy` - Which lower frequencies a scalable node may present
pub fn calculate_label_diff(
    required: &BTreeSet<Frequency>,
    on_node: &BTreeSet<Frequency>,
    native: Frequency,
    scalable: bool,
    policy: ScalingPolicy,
) -> LabelDiff {
    let desired = desired_frequencies(required, native, scalable, policy);

    LabelDiff {
        to_add: desired.difference(on_node).copied().collect(),
        to_remove: on_node.difference(&desired).copied().collect(),
    }
}

/// Compute the diff for a node from its own labels
///
/// # Errors
/// Returns a capability error when the node's native frequency cannot be
/// determined.
pub fn node_label_diff(
    node: &Node,
    required: &BTreeSet<Frequency>,
    policy: ScalingPolicy,
) -> Result<LabelDiff> {
    let (native, scalable) = node.tsc_frequency()?;
    let on_node = node.tsc_frequencies_on_node();
    let mut diff = calculate_label_diff(required, &on_node, native, scalable, policy);

    // Keys set to anything but "true" are not advertised, but still go once
    // their frequency is no longer desired.
    let desired = desired_frequencies(required, native, scalable, policy);
    diff.to_remove
        .extend(node.tsc_frequencies_labeled().difference(&desired).copied());

    Ok(diff)
}

/// Return a copy of `original` with its frequency labels reconciled
///
/// Only frequency scheduling labels change; every other label and field is
/// carried over untouched.
pub fn calculate_node_label_changes(
    original: &Node,
    required: &BTreeSet<Frequency>,
    policy: ScalingPolicy,
) -> Result<Node> {
    let diff = node_label_diff(original, required, policy)?;

    let mut modified = original.clone();
    diff.apply(&mut modified);
    Ok(modified)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hz(v: i64) -> Frequency {
        Frequency::new(v).unwrap()
    }

    fn set(values: &[i64]) -> BTreeSet<Frequency> {
        values.iter().map(|&v| hz(v)).collect()
    }

    #[test]
    fn test_non_scalable_gets_only_native() {
        let diff = calculate_label_diff(
            &set(&[1000, 900]),
            &set(&[]),
            hz(1000),
            false,
            ScalingPolicy::default(),
        );

        assert_eq!(diff.to_add, set(&[1000]));
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_scalable_adds_lower_required() {
        let diff = calculate_label_diff(
            &set(&[1000, 900]),
            &set(&[1000]),
            hz(1000),
            true,
            ScalingPolicy::default(),
        );

        assert_eq!(diff.to_add, set(&[900]));
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_stale_labels_removed() {
        let diff = calculate_label_diff(
            &set(&[1000]),
            &set(&[900, 800]),
            hz(1000),
            true,
            ScalingPolicy::default(),
        );

        assert_eq!(diff.to_add, set(&[1000]));
        assert_eq!(diff.to_remove, set(&[800, 900]));
    }

    #[test]
    fn test_scalable_never_adds_higher() {
        let diff = calculate_label_diff(
            &set(&[1200, 900]),
            &set(&[]),
            hz(1000),
            true,
            ScalingPolicy::default(),
        );

        assert_eq!(diff.to_add, set(&[900, 1000]));
    }

    #[test]
    fn test_non_scalable_never_removes_native() {
        let diff = calculate_label_diff(
            &set(&[]),
            &set(&[1000, 900]),
            hz(1000),
            false,
            ScalingPolicy::default(),
        );

        assert!(!diff.to_remove.contains(&hz(1000)));
        assert_eq!(diff.to_remove, set(&[900]));
    }

    #[test]
    fn test_below_native_policy() {
        let required = set(&[1000, 900]);

        let strict = desired_frequencies(&required, hz(1000), true, ScalingPolicy::BelowNative);
        let inclusive =
            desired_frequencies(&required, hz(1000), true, ScalingPolicy::AtOrBelowNative);

        // Native is always present, so both policies agree here
        assert_eq!(strict, inclusive);

        let strict = desired_frequencies(&set(&[900]), hz(900), true, ScalingPolicy::BelowNative);
        assert_eq!(strict, set(&[900]));
    }

    #[test]
    fn test_converged_node_is_empty() {
        let node = Node::new("n1")
            .with_tsc_frequency(hz(1000))
            .with_scalable(true)
            .with_frequency_label(hz(1000))
            .with_frequency_label(hz(900));

        let diff = node_label_diff(&node, &set(&[900]), ScalingPolicy::default()).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_idempotent_after_apply() {
        let required = set(&[1200, 1000, 900, 700]);
        let nodes = vec![
            Node::new("a").with_tsc_frequency(hz(1000)),
            Node::new("b")
                .with_tsc_frequency(hz(1000))
                .with_scalable(true)
                .with_frequency_label(hz(800)),
            Node::new("c")
                .with_tsc_frequency(hz(900))
                .with_scalable(true)
                .with_frequency_label(hz(1200)),
        ];

        for node in nodes {
            for policy in [ScalingPolicy::AtOrBelowNative, ScalingPolicy::BelowNative] {
                let modified = calculate_node_label_changes(&node, &required, policy).unwrap();
                let again = node_label_diff(&modified, &required, policy).unwrap();
                assert!(again.is_empty(), "node {} not converged", node.name());
            }
        }
    }

    #[test]
    fn test_changes_keep_unrelated_labels() {
        let node = Node::new("n1")
            .with_tsc_frequency(hz(1000))
            .with_label("zone", "a");

        let modified =
            calculate_node_label_changes(&node, &set(&[900]), ScalingPolicy::default()).unwrap();

        assert_eq!(modified.labels().get("zone"), Some("a"));
        assert!(modified.labels().is_true(&hz(1000).to_label()));
        assert!(!modified.labels().contains(&hz(900).to_label()));
    }

    #[test]
    fn test_non_true_labels_removed_or_overwritten() {
        let node = Node::new("n1")
            .with_tsc_frequency(hz(1000))
            .with_label(hz(1000).to_label(), "false")
            .with_label(hz(700).to_label(), "false");

        let diff = node_label_diff(&node, &set(&[1000]), ScalingPolicy::default()).unwrap();
        assert_eq!(diff.to_add, set(&[1000]));
        assert_eq!(diff.to_remove, set(&[700]));

        let modified =
            calculate_node_label_changes(&node, &set(&[1000]), ScalingPolicy::default()).unwrap();
        assert!(modified.labels().is_true(&hz(1000).to_label()));
        assert!(!modified.labels().contains(&hz(700).to_label()));
        assert!(node_label_diff(&modified, &set(&[1000]), ScalingPolicy::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_canonical_keys_are_foreign() {
        let padded = "scheduling.node.kubevirt.io/tsc-frequency-0900";
        let signed = "scheduling.node.kubevirt.io/tsc-frequency-+1000";
        let node = Node::new("n1")
            .with_tsc_frequency(hz(1000))
            .with_label(padded, "true")
            .with_label(signed, "true");

        let diff = node_label_diff(&node, &set(&[1000]), ScalingPolicy::default()).unwrap();
        assert_eq!(diff.to_add, set(&[1000]));
        assert!(diff.to_remove.is_empty());

        let modified =
            calculate_node_label_changes(&node, &set(&[1000]), ScalingPolicy::default()).unwrap();
        assert!(modified.labels().is_true(&hz(1000).to_label()));
        assert_eq!(modified.labels().get(padded), Some("true"));
        assert_eq!(modified.labels().get(signed), Some("true"));
        assert!(node_label_diff(&modified, &set(&[1000]), ScalingPolicy::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_undeterminable_frequency_fails() {
        let node = Node::new("broken");
        let result = calculate_node_label_changes(&node, &set(&[1000]), ScalingPolicy::default());
        assert!(result.is_err());
    }
}
