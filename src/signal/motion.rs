//! Device motion stability
//!
//! A leaky-bucket estimator over accelerometer samples: each movement burst
//! drains a fixed amount (at most once per refractory period), and every
//! still sample refills by one step toward the ceiling.

use crate::config::StabilityConfig;
use crate::error::TrustError;

/// Upper bound of the stability score
pub const MAX_STABILITY: u8 = 100;

/// What a single motion sample did to the stability score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Movement burst counted; stability dropped
    Shake,
    /// Movement inside the refractory window; ignored
    Refractory,
    /// Still sample; stability recovered one step
    Recovered,
    /// Still sample while already at the ceiling
    Steady,
}

/// Decaying device stability scalar (0-100)
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    stability: u8,
    last_shake_ms: Option<u64>,
    shake_count: u32,
    config: StabilityConfig,
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}

impl StabilityTracker {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            stability: MAX_STABILITY,
            last_shake_ms: None,
            shake_count: 0,
            config,
        }
    }

    /// Feed one accelerometer sample (m/s² per axis) taken at `now_ms`
    pub fn on_motion_sample(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        now_ms: u64,
    ) -> Result<MotionOutcome, TrustError> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(TrustError::NonFiniteSample(format!(
                "accelerometer ({x}, {y}, {z})"
            )));
        }

        let magnitude = (x * x + y * y + z * z).sqrt();
        let deviation = magnitude - self.config.gravity;

        if deviation > self.config.movement_threshold {
            if let Some(last) = self.last_shake_ms {
                if now_ms < last {
                    return Err(TrustError::NegativeInterval {
                        previous_ms: last,
                        now_ms,
                    });
                }
                if now_ms - last < self.config.refractory_ms {
                    return Ok(MotionOutcome::Refractory);
                }
            }

            self.shake_count += 1;
            self.last_shake_ms = Some(now_ms);
            self.stability = self.stability.saturating_sub(self.config.shake_penalty);
            log::trace!(
                "movement burst ({:.2} m/s² over gravity), stability now {}",
                deviation,
                self.stability
            );
            Ok(MotionOutcome::Shake)
        } else if self.stability < MAX_STABILITY {
            self.stability = self
                .stability
                .saturating_add(self.config.recovery_step)
                .min(MAX_STABILITY);
            Ok(MotionOutcome::Recovered)
        } else {
            Ok(MotionOutcome::Steady)
        }
    }

    pub fn stability(&self) -> u8 {
        self.stability
    }

    /// Movement bursts counted since the tracker was created or reset
    pub fn shake_count(&self) -> u32 {
        self.shake_count
    }

    pub fn reset(&mut self) {
        self.stability = MAX_STABILITY;
        self.last_shake_ms = None;
        self.shake_count = 0;
    }
}
