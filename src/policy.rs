//! Access decisions derived from a trust score

use serde::{Deserialize, Serialize};

use crate::config::LevelThresholds;
use crate::types::TrustScore;

/// How much of a sensitive value (such as an account balance) may be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceVisibility {
    Full,
    Masked,
    Hidden,
}

/// Score-driven gates for sensitive operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    thresholds: LevelThresholds,
}

impl AccessPolicy {
    pub fn new(thresholds: LevelThresholds) -> Self {
        Self { thresholds }
    }

    /// Transfers need at least medium trust. No score yet means full trust.
    pub fn can_transfer(&self, trust: Option<&TrustScore>) -> bool {
        Self::score_of(trust) >= self.thresholds.medium
    }

    pub fn balance_visibility(&self, trust: Option<&TrustScore>) -> BalanceVisibility {
        let score = Self::score_of(trust);
        if score >= self.thresholds.high {
            BalanceVisibility::Full
        } else if score >= self.thresholds.medium {
            BalanceVisibility::Masked
        } else {
            BalanceVisibility::Hidden
        }
    }

    fn score_of(trust: Option<&TrustScore>) -> u8 {
        trust.map_or(100, |t| t.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrustLevel;
    use std::collections::BTreeMap;

    fn trust(score: u8) -> TrustScore {
        TrustScore {
            score,
            level: TrustLevel::Critical,
            factors: BTreeMap::new(),
            computation_latency_us: 0,
        }
    }

    #[test]
    fn test_transfer_gate() {
        let policy = AccessPolicy::default();
        assert!(policy.can_transfer(None));
        assert!(policy.can_transfer(Some(&trust(50))));
        assert!(!policy.can_transfer(Some(&trust(49))));
    }

    #[test]
    fn test_balance_visibility() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.balance_visibility(None), BalanceVisibility::Full);
        assert_eq!(policy.balance_visibility(Some(&trust(80))), BalanceVisibility::Full);
        assert_eq!(policy.balance_visibility(Some(&trust(65))), BalanceVisibility::Masked);
        assert_eq!(policy.balance_visibility(Some(&trust(10))), BalanceVisibility::Hidden);
    }
}
