//! Hard security overrides
//!
//! Overrides run after the weighted blend as an ordered pipeline. Each rule
//! inspects the evaluation input and may cap, floor or hard-set the score;
//! rules later in the pipeline see (and win over) the result of earlier ones.
//! A firing rule may also record a `security` factor, replacing any security
//! factor recorded before it.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::config::OverrideConfig;
use crate::engine::EvaluationInput;
use crate::types::{FactorKind, FactorScore, FactorStatus};

/// Transformation an override applies to the blended score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreAdjustment {
    /// Score may not exceed this value
    Cap(u8),
    /// Score may not fall below this value
    Floor(u8),
    /// Score is replaced by this value
    Set(u8),
}

impl ScoreAdjustment {
    pub fn apply(&self, score: f64) -> f64 {
        match *self {
            ScoreAdjustment::Cap(cap) => score.min(f64::from(cap)),
            ScoreAdjustment::Floor(floor) => score.max(f64::from(floor)),
            ScoreAdjustment::Set(value) => f64::from(value),
        }
    }
}

/// Outcome of a rule that fired
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideVerdict {
    pub adjustment: ScoreAdjustment,
    /// Security factor to record alongside the adjustment
    pub factor: Option<FactorScore>,
}

/// A single override rule
pub trait ScoreOverride: Debug + Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Return a verdict when the rule fires for `input`
    fn check(&self, input: &EvaluationInput) -> Option<OverrideVerdict>;
}

/// Caps the score once consecutive login failures reach a threshold
#[derive(Debug, Clone)]
pub struct LoginFailureCap {
    pub threshold: u32,
    pub cap: u8,
}

impl ScoreOverride for LoginFailureCap {
    fn name(&self) -> &str {
        "login_failure_cap"
    }

    fn check(&self, input: &EvaluationInput) -> Option<OverrideVerdict> {
        if input.login_failures < self.threshold {
            return None;
        }
        Some(OverrideVerdict {
            adjustment: ScoreAdjustment::Cap(self.cap),
            factor: Some(FactorScore::new(
                FactorKind::Security,
                self.cap,
                100,
                FactorStatus::TooManyAttempts,
            )),
        })
    }
}

/// Forces the score to zero when an injection attempt was detected
#[derive(Debug, Clone, Default)]
pub struct InjectionLockout;

impl ScoreOverride for InjectionLockout {
    fn name(&self) -> &str {
        "injection_lockout"
    }

    fn check(&self, input: &EvaluationInput) -> Option<OverrideVerdict> {
        if !input.injection_detected {
            return None;
        }
        Some(OverrideVerdict {
            adjustment: ScoreAdjustment::Set(0),
            factor: Some(FactorScore::new(
                FactorKind::Security,
                0,
                100,
                FactorStatus::SqlInjection,
            )),
        })
    }
}

/// Ordered list of override rules
#[derive(Debug, Default)]
pub struct OverridePipeline {
    rules: Vec<Box<dyn ScoreOverride>>,
}

impl OverridePipeline {
    /// Empty pipeline: the blended score passes through untouched
    pub fn empty() -> Self {
        Self::default()
    }

    /// Failure cap followed by injection lockout
    pub fn standard(config: &OverrideConfig) -> Self {
        Self::empty()
            .with_rule(LoginFailureCap {
                threshold: config.login_failure_threshold,
                cap: config.login_failure_cap,
            })
            .with_rule(InjectionLockout)
    }

    /// Append a rule; it runs after every rule already present
    pub fn with_rule<R: ScoreOverride + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn push(&mut self, rule: Box<dyn ScoreOverride>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule in order over `score`, recording security factors
    pub fn apply(
        &self,
        mut score: f64,
        input: &EvaluationInput,
        factors: &mut BTreeMap<FactorKind, FactorScore>,
    ) -> f64 {
        for rule in &self.rules {
            if let Some(verdict) = rule.check(input) {
                let adjusted = verdict.adjustment.apply(score);
                log::warn!(
                    "override {} fired: {:.1} -> {:.1}",
                    rule.name(),
                    score,
                    adjusted
                );
                score = adjusted;
                if let Some(factor) = verdict.factor {
                    factors.insert(factor.name, factor);
                }
            }
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(login_failures: u32, injection_detected: bool) -> EvaluationInput {
        EvaluationInput {
            login_failures,
            injection_detected,
            ..EvaluationInput::default()
        }
    }

    fn run(pipeline: &OverridePipeline, score: f64, input: &EvaluationInput) -> (f64, BTreeMap<FactorKind, FactorScore>) {
        let mut factors = BTreeMap::new();
        let score = pipeline.apply(score, input, &mut factors);
        (score, factors)
    }

    #[test]
    fn test_adjustments() {
        assert_eq!(ScoreAdjustment::Cap(40).apply(90.0), 40.0);
        assert_eq!(ScoreAdjustment::Cap(40).apply(20.0), 20.0);
        assert_eq!(ScoreAdjustment::Floor(30).apply(10.0), 30.0);
        assert_eq!(ScoreAdjustment::Floor(30).apply(50.0), 50.0);
        assert_eq!(ScoreAdjustment::Set(0).apply(99.0), 0.0);
    }

    #[test]
    fn test_no_rule_fires_for_clean_input() {
        let pipeline = OverridePipeline::standard(&OverrideConfig::default());
        let (score, factors) = run(&pipeline, 92.5, &input(4, false));
        assert_eq!(score, 92.5);
        assert!(factors.is_empty());
    }

    #[test]
    fn test_failure_cap() {
        let pipeline = OverridePipeline::standard(&OverrideConfig::default());
        let (score, factors) = run(&pipeline, 92.5, &input(5, false));
        assert_eq!(score, 40.0);
        assert_eq!(factors[&FactorKind::Security].status, FactorStatus::TooManyAttempts);
        assert_eq!(factors[&FactorKind::Security].score, 40);
    }

    #[test]
    fn test_injection_wins_over_failure_cap() {
        let pipeline = OverridePipeline::standard(&OverrideConfig::default());
        let (score, factors) = run(&pipeline, 92.5, &input(7, true));
        assert_eq!(score, 0.0);
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[&FactorKind::Security].status, FactorStatus::SqlInjection);
    }

    #[derive(Debug)]
    struct MinimumFloor;

    impl ScoreOverride for MinimumFloor {
        fn name(&self) -> &str {
            "minimum_floor"
        }

        fn check(&self, _input: &EvaluationInput) -> Option<OverrideVerdict> {
            Some(OverrideVerdict {
                adjustment: ScoreAdjustment::Floor(15),
                factor: None,
            })
        }
    }

    #[test]
    fn test_later_rules_see_earlier_results() {
        let pipeline = OverridePipeline::standard(&OverrideConfig::default()).with_rule(MinimumFloor);
        assert_eq!(pipeline.len(), 3);

        // Lockout sets 0, the floor appended after it lifts it to 15
        let (score, factors) = run(&pipeline, 80.0, &input(0, true));
        assert_eq!(score, 15.0);
        assert_eq!(factors[&FactorKind::Security].status, FactorStatus::SqlInjection);
    }

    #[test]
    fn test_empty_pipeline_passes_through() {
        let pipeline = OverridePipeline::empty();
        assert!(pipeline.is_empty());
        let (score, _) = run(&pipeline, 12.0, &input(10, true));
        assert_eq!(score, 12.0);
    }
}
