use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scenario::ScoreDelta;

/// Running score totals of one conversation attempt.
///
/// Always derived: the element-wise sum of the chosen options' deltas plus
/// a `total` across the three axes. Recomputing from the selection history
/// must reproduce the same values; totals are never decremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTotals {
    /// Accumulated clarity score.
    pub clarity: i32,
    /// Accumulated friendliness score.
    pub friendly: i32,
    /// Accumulated empathy score.
    pub empathy: i32,
    /// Sum of the three axes.
    pub total: i32,
}

impl ScoreTotals {
    /// Accumulate one step's delta into new totals.
    pub fn plus(self, delta: &ScoreDelta) -> Self {
        let clarity = self.clarity + delta.clarity;
        let friendly = self.friendly + delta.friendly;
        let empathy = self.empathy + delta.empathy;
        Self {
            clarity,
            friendly,
            empathy,
            total: clarity + friendly + empathy,
        }
    }

    /// Totals over an ordered sequence of deltas.
    pub fn from_deltas<'a>(deltas: impl IntoIterator<Item = &'a ScoreDelta>) -> Self {
        deltas.into_iter().fold(Self::default(), ScoreTotals::plus)
    }
}

/// Outcome tier of a finished attempt.
///
/// Variant order gives the best-of ranking used by the per-user aggregate:
/// `very_high > high > medium > low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLevel {
    /// Total below 6.
    Low,
    /// Total in [6, 12).
    Medium,
    /// Total in [12, 18).
    High,
    /// Total of 18 or more.
    VeryHigh,
}

impl OutcomeLevel {
    /// Classify a final total into its tier.
    pub fn classify(total: i32) -> Self {
        if total >= 18 {
            OutcomeLevel::VeryHigh
        } else if total >= 12 {
            OutcomeLevel::High
        } else if total >= 6 {
            OutcomeLevel::Medium
        } else {
            OutcomeLevel::Low
        }
    }
}

impl fmt::Display for OutcomeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeLevel::Low => write!(f, "low"),
            OutcomeLevel::Medium => write!(f, "medium"),
            OutcomeLevel::High => write!(f, "high"),
            OutcomeLevel::VeryHigh => write!(f, "very_high"),
        }
    }
}

impl FromStr for OutcomeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(OutcomeLevel::Low),
            "medium" => Ok(OutcomeLevel::Medium),
            "high" => Ok(OutcomeLevel::High),
            "very_high" => Ok(OutcomeLevel::VeryHigh),
            _ => Err(format!("Unknown outcome level: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plus_accumulates_each_axis() {
        let totals = ScoreTotals::default()
            .plus(&ScoreDelta {
                clarity: 1,
                friendly: -1,
                empathy: 2,
            })
            .plus(&ScoreDelta {
                clarity: 0,
                friendly: 2,
                empathy: 1,
            });

        assert_eq!(totals.clarity, 1);
        assert_eq!(totals.friendly, 1);
        assert_eq!(totals.empathy, 3);
        assert_eq!(totals.total, 5);
    }

    #[test]
    fn test_from_deltas_matches_fold_order() {
        let deltas = [
            ScoreDelta {
                clarity: 2,
                friendly: 0,
                empathy: 0,
            },
            ScoreDelta {
                clarity: -1,
                friendly: 1,
                empathy: 1,
            },
        ];
        let totals = ScoreTotals::from_deltas(deltas.iter());
        assert_eq!(totals.clarity, 1);
        assert_eq!(totals.total, 3);
    }

    #[test]
    fn test_classify_boundaries_are_exact() {
        assert_eq!(OutcomeLevel::classify(18), OutcomeLevel::VeryHigh);
        assert_eq!(OutcomeLevel::classify(17), OutcomeLevel::High);
        assert_eq!(OutcomeLevel::classify(12), OutcomeLevel::High);
        assert_eq!(OutcomeLevel::classify(11), OutcomeLevel::Medium);
        assert_eq!(OutcomeLevel::classify(6), OutcomeLevel::Medium);
        assert_eq!(OutcomeLevel::classify(5), OutcomeLevel::Low);
        assert_eq!(OutcomeLevel::classify(0), OutcomeLevel::Low);
        assert_eq!(OutcomeLevel::classify(-3), OutcomeLevel::Low);
    }

    #[test]
    fn test_outcome_ranking() {
        assert!(OutcomeLevel::VeryHigh > OutcomeLevel::High);
        assert!(OutcomeLevel::High > OutcomeLevel::Medium);
        assert!(OutcomeLevel::Medium > OutcomeLevel::Low);
    }

    #[test]
    fn test_outcome_string_roundtrip() {
        for level in [
            OutcomeLevel::Low,
            OutcomeLevel::Medium,
            OutcomeLevel::High,
            OutcomeLevel::VeryHigh,
        ] {
            let parsed: OutcomeLevel = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
        assert!("excellent".parse::<OutcomeLevel>().is_err());
    }
}
