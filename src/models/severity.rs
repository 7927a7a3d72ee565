//! The single ordered severity scale shared by the classifier, deduplicator,
//! feed sorter and subscriber preferences.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ranked severity of an alert.
///
/// The derived `Ord` is the canonical comparison: `Low < Medium < High <
/// Critical`. Variant order must not change.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, no immediate action expected.
    #[default]
    Low,
    /// Advisory; preventive action recommended.
    Medium,
    /// Significant risk; action recommended soon.
    High,
    /// Imminent or ongoing hazard; act now.
    Critical,
}

/// Returned when a string does not name a severity.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown severity: {0}")]
pub struct ParseSeverityError(pub String);

impl Severity {
    /// All severities, highest first.
    pub const DESCENDING: [Severity; 4] =
        [Severity::Critical, Severity::High, Severity::Medium, Severity::Low];

    /// Numeric rank, higher is more severe. Persisted alongside alerts so the
    /// store can sort without decoding the enum.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }

    /// Inverse of [`Severity::rank`].
    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            0 => Some(Severity::Low),
            1 => Some(Severity::Medium),
            2 => Some(Severity::High),
            3 => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Lowercase wire and storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" | "moderate" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_matches_rank() {
        let mut all = vec![Severity::Medium, Severity::Critical, Severity::Low, Severity::High];
        all.sort();
        assert_eq!(all, vec![Severity::Low, Severity::Medium, Severity::High, Severity::Critical]);
        for pair in all.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_rank_roundtrip() {
        for severity in Severity::DESCENDING {
            assert_eq!(Severity::from_rank(severity.rank()), Some(severity));
        }
        assert_eq!(Severity::from_rank(9), None);
    }

    #[test]
    fn test_parse_accepts_moderate_alias() {
        assert_eq!("Moderate".parse::<Severity>(), Ok(Severity::Medium));
        assert_eq!(" CRITICAL ".parse::<Severity>(), Ok(Severity::Critical));
        assert!("emergency".parse::<Severity>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"high\"");
        let parsed: Severity = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(parsed, Severity::Critical);
    }
}
