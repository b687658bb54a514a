//! TSC frequency topology
//!
//! The pure half of the controller:
//!
//! - **filter**: which nodes take part in reconciliation
//! - **hinter**: which frequencies the cluster requires
//! - **diff**: which frequency labels each node gains or loses
//! - **patch**: the minimal merge patch that applies a diff

mod diff;
mod filter;
mod hinter;
mod patch;

pub use diff::{
    calculate_label_diff, calculate_node_label_changes, desired_frequencies, node_label_diff,
    LabelDiff, ScalingPolicy,
};
pub use filter::{filter_nodes, has_invtsc_frequency};
pub use hinter::{required_frequencies, ClusterHinter, Hinter, StaticHinter};
pub use patch::{
    build_node_patch, create_two_way_merge_patch, patched_label_keys, MERGE_PATCH_CONTENT_TYPE,
};
