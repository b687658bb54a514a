//! Node objects as served by the cluster API
//!
//! Only the metadata the controller reads or writes is modelled; all other
//! fields of the API object are ignored on deserialization and therefore
//! never appear in a patch.

use super::frequency::{
    Frequency, INVTSC_LABEL, TSC_FREQUENCY_LABEL, TSC_FREQUENCY_SCHEDULING_LABEL_PREFIX,
    TSC_SCALABLE_LABEL,
};
use super::labels::{Labels, LABEL_TRUE};
use crate::{FreqSyncError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Object metadata of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default)]
    pub labels: Labels,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// A cluster node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub metadata: ObjectMeta,
}

impl Node {
    /// Create a node with the given name and no labels
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    /// Set a label (builder style)
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key, value);
        self
    }

    /// Set the measured TSC frequency label
    pub fn with_tsc_frequency(self, freq: Frequency) -> Self {
        self.with_label(TSC_FREQUENCY_LABEL, freq.to_string())
            .with_label(INVTSC_LABEL, LABEL_TRUE)
    }

    /// Mark the node as TSC scalable
    pub fn with_scalable(self, scalable: bool) -> Self {
        self.with_label(TSC_SCALABLE_LABEL, scalable.to_string())
    }

    /// Advertise a supported frequency
    pub fn with_frequency_label(self, freq: Frequency) -> Self {
        self.with_label(freq.to_label(), LABEL_TRUE)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn labels(&self) -> &Labels {
        &self.metadata.labels
    }

    pub fn labels_mut(&mut self) -> &mut Labels {
        &mut self.metadata.labels
    }

    /// Native TSC frequency and scalability of the node
    ///
    /// # Errors
    /// `MissingFrequency` when the frequency label is absent,
    /// `InvalidFrequency` when it is not a positive integer.
    pub fn tsc_frequency(&self) -> Result<(Frequency, bool)> {
        let raw = self
            .labels()
            .get(TSC_FREQUENCY_LABEL)
            .ok_or_else(|| FreqSyncError::MissingFrequency {
                node: self.name().to_string(),
            })?;

        let freq = raw
            .parse::<Frequency>()
            .map_err(|_| FreqSyncError::InvalidFrequency {
                node: self.name().to_string(),
                value: raw.to_string(),
            })?;

        Ok((freq, self.labels().is_true(TSC_SCALABLE_LABEL)))
    }

    /// Frequencies currently advertised through scheduling labels
    ///
    /// Only labels set to `"true"` count as advertised. Keys carrying any
    /// other value are reported by [`tsc_frequencies_labeled`](Self::tsc_frequencies_labeled)
    /// and are removed by reconciliation once their frequency is not desired.
    pub fn tsc_frequencies_on_node(&self) -> BTreeSet<Frequency> {
        self.labels()
            .iter()
            .filter(|(key, value)| {
                key.starts_with(TSC_FREQUENCY_SCHEDULING_LABEL_PREFIX) && *value == LABEL_TRUE
            })
            .filter_map(|(key, _)| Frequency::from_label(key))
            .collect()
    }

    /// Frequencies with a scheduling label key, whatever its value
    ///
    /// Non-canonical keys such as `tsc-frequency-0900` are not included.
    pub fn tsc_frequencies_labeled(&self) -> BTreeSet<Frequency> {
        self.labels()
            .keys()
            .filter_map(Frequency::from_label)
            .collect()
    }
}
