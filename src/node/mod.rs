//! Node model
//!
//! Core data structures for cluster nodes and the TSC frequency labels
//! they carry.

mod frequency;
mod labels;
mod object;

pub use frequency::{
    parse_frequency_list, Frequency, INVTSC_LABEL, TSC_FREQUENCY_LABEL,
    TSC_FREQUENCY_SCHEDULING_LABEL_PREFIX, TSC_SCALABLE_LABEL,
};
pub use labels::{Labels, LABEL_TRUE};
pub use object::{Node, ObjectMeta};
