//! Node eligibility

use crate::node::{Node, INVTSC_LABEL, TSC_FREQUENCY_LABEL};

/// Whether a node exposes an invariant TSC with a measured frequency
///
/// Only the presence of the frequency label is checked here. A label that
/// fails to parse is reported later as a per-node error instead of silently
/// dropping the node.
pub fn has_invtsc_frequency(node: &Node) -> bool {
    node.labels().is_true(INVTSC_LABEL) && node.labels().contains(TSC_FREQUENCY_LABEL)
}

/// Select the nodes matching every predicate
pub fn filter_nodes<'a, I>(nodes: I, predicates: &[fn(&Node) -> bool]) -> Vec<Node>
where
    I: IntoIterator<Item = &'a Node>,
{
    nodes
        .into_iter()
        .filter(|node| predicates.iter().all(|pred| pred(node)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Frequency;

    #[test]
    fn test_filters_nodes_without_frequency() {
        let nodes = vec![
            Node::new("with-freq").with_tsc_frequency(Frequency::new(1000).unwrap()),
            Node::new("no-freq").with_label(INVTSC_LABEL, "true"),
            Node::new("no-invtsc").with_label(TSC_FREQUENCY_LABEL, "1000"),
            Node::new("garbage-freq")
                .with_label(INVTSC_LABEL, "true")
                .with_label(TSC_FREQUENCY_LABEL, "fast"),
        ];

        let eligible = filter_nodes(&nodes, &[has_invtsc_frequency]);
        let names: Vec<&str> = eligible.iter().map(Node::name).collect();

        assert_eq!(names, vec!["with-freq", "garbage-freq"]);
    }

    #[test]
    fn test_no_predicates_keeps_everything() {
        let nodes = vec![Node::new("a"), Node::new("b")];
        assert_eq!(filter_nodes(&nodes, &[]).len(), 2);
    }
}
