//! TSC frequency values and their label encoding

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label holding a node's measured TSC frequency in Hz
pub const TSC_FREQUENCY_LABEL: &str = "cpu-timer.node.kubevirt.io/tsc-frequency";

/// Label marking a node as able to present frequencies below its native one
pub const TSC_SCALABLE_LABEL: &str = "cpu-timer.node.kubevirt.io/tsc-scalable";

/// CPU feature label for an invariant TSC
pub const INVTSC_LABEL: &str = "cpu-feature.node.kubevirt.io/invtsc";

/// Prefix of the scheduling labels advertising a supported frequency
pub const TSC_FREQUENCY_SCHEDULING_LABEL_PREFIX: &str = "scheduling.node.kubevirt.io/tsc-frequency-";

/// A TSC frequency in Hz
///
/// Always strictly positive. Zero is the "unknown" value of the surrounding
/// ecosystem and never denotes a real frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Frequency(i64);

impl Frequency {
    /// Create a frequency, rejecting zero and negative values
    pub fn new(hz: i64) -> Option<Self> {
        (hz > 0).then_some(Self(hz))
    }

    /// Get the value in Hz
    pub fn hz(&self) -> i64 {
        self.0
    }

    /// Scheduling label key advertising this frequency
    pub fn to_label(&self) -> String {
        format!("{}{}", TSC_FREQUENCY_SCHEDULING_LABEL_PREFIX, self.0)
    }

    /// Parse a scheduling label key back into a frequency
    ///
    /// Returns `None` for keys without the scheduling prefix, with a
    /// suffix that is not a positive integer, or with a non-canonical
    /// spelling of one (`-0900`, `-+1000`). Such keys are not ours.
    pub fn from_label(key: &str) -> Option<Self> {
        let freq: Self = key
            .strip_prefix(TSC_FREQUENCY_SCHEDULING_LABEL_PREFIX)?
            .parse()
            .ok()?;
        (freq.to_label() == key).then_some(freq)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hz: i64 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid frequency '{}': {}", s, e))?;
        Self::new(hz).ok_or_else(|| format!("frequency must be positive, got {}", hz))
    }
}

impl TryFrom<i64> for Frequency {
    type Error = String;

    fn try_from(hz: i64) -> Result<Self, Self::Error> {
        Self::new(hz).ok_or_else(|| format!("frequency must be positive, got {}", hz))
    }
}

impl From<Frequency> for i64 {
    fn from(f: Frequency) -> Self {
        f.0
    }
}

/// Parse a comma-separated frequency list such as `"1000,900"`
pub fn parse_frequency_list(s: &str) -> Result<Vec<Frequency>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive() {
        assert!(Frequency::new(0).is_none());
        assert!(Frequency::new(-5).is_none());
        assert_eq!(Frequency::new(1000).map(|f| f.hz()), Some(1000));
    }

    #[test]
    fn test_label_encoding() {
        let freq = Frequency::new(2_400_000_000).unwrap();
        let label = freq.to_label();

        assert_eq!(
            label,
            "scheduling.node.kubevirt.io/tsc-frequency-2400000000"
        );
        assert_eq!(Frequency::from_label(&label), Some(freq));
    }

    #[test]
    fn test_from_label_ignores_foreign_keys() {
        assert_eq!(Frequency::from_label("kubernetes.io/hostname"), None);
        assert_eq!(
            Frequency::from_label("scheduling.node.kubevirt.io/tsc-frequency-abc"),
            None
        );
        assert_eq!(
            Frequency::from_label("scheduling.node.kubevirt.io/tsc-frequency-0"),
            None
        );
    }

    #[test]
    fn test_from_label_rejects_non_canonical_keys() {
        for key in [
            "scheduling.node.kubevirt.io/tsc-frequency-0900",
            "scheduling.node.kubevirt.io/tsc-frequency-+1000",
            "scheduling.node.kubevirt.io/tsc-frequency- 1000",
        ] {
            assert_eq!(Frequency::from_label(key), None, "{}", key);
        }
    }

    #[test]
    fn test_parse_frequency_list() {
        let freqs = parse_frequency_list("1000, 900,,800").unwrap();
        assert_eq!(
            freqs.iter().map(Frequency::hz).collect::<Vec<_>>(),
            vec![1000, 900, 800]
        );
        assert!(parse_frequency_list("1000,fast").is_err());
    }

    #[test]
    fn test_serde_as_integer() {
        let freq: Frequency = serde_json::from_str("1000").unwrap();
        assert_eq!(freq.hz(), 1000);
        assert_eq!(serde_json::to_string(&freq).unwrap(), "1000");
        assert!(serde_json::from_str::<Frequency>("0").is_err());
    }
}
