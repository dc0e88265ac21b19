use crate::config::{AdaptiveConfig, OptimizerConfig};
use crate::types::{AdjustmentReason, SchedulingAdjustment};

use super::adaptive::AdaptiveEaseFactor;

/// Scales the baseline interval toward a target retention, never by more
/// than `max_ratio_deviation` in either direction.
#[derive(Debug, Clone)]
pub struct IntervalOptimizer {
    config: OptimizerConfig,
    ease: AdaptiveEaseFactor,
}

impl IntervalOptimizer {
    pub fn new(config: OptimizerConfig, adaptive: AdaptiveConfig) -> Self {
        Self {
            config,
            ease: AdaptiveEaseFactor::new(adaptive),
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Zero (same-day) intervals pass through untouched.
    pub fn optimize(&self, base_interval: i32, forget_prob: f64, confidence: f64) -> i32 {
        let cfg = &self.config;
        if base_interval < 1 || !forget_prob.is_finite() || confidence < cfg.min_confidence {
            return base_interval;
        }

        let raw_ratio = if forget_prob < cfg.near_zero_forget {
            cfg.stable_extension_ratio
        } else {
            cfg.target_forget_probability / forget_prob
        };
        let c = confidence.min(1.0);
        let lo = 1.0 - cfg.max_ratio_deviation;
        let hi = 1.0 + cfg.max_ratio_deviation;
        let ratio = (1.0 + (raw_ratio - 1.0) * c).clamp(lo, hi);

        let base = base_interval as f64;
        let min_days = (base * lo).ceil() as i32;
        let max_days = (base * hi).floor() as i32;
        let days = ((base * ratio).round() as i32).clamp(min_days, max_days);
        days.max(1)
    }

    pub fn reason(&self, forget_prob: f64, confidence: f64) -> AdjustmentReason {
        let cfg = &self.config;
        if confidence < cfg.insufficient_confidence {
            AdjustmentReason::InsufficientData
        } else if forget_prob > cfg.high_risk_forget {
            AdjustmentReason::ElevatedRisk
        } else if forget_prob < cfg.stable_forget {
            AdjustmentReason::StableMemory
        } else {
            AdjustmentReason::MinorTuning
        }
    }

    /// `last_outcome` is the label of the review just recorded, if any
    /// (1.0 forgotten, 0.0 remembered).
    pub fn compute_adjustment(
        &self,
        base_interval: i32,
        base_ease: f64,
        forget_prob: f64,
        confidence: f64,
        last_outcome: Option<f64>,
    ) -> SchedulingAdjustment {
        let adjusted_ease_factor = match last_outcome {
            Some(outcome) => self.ease.adjust_ef(base_ease, forget_prob, outcome, confidence),
            None => self.ease.predict_initial_ef(forget_prob, confidence),
        };

        SchedulingAdjustment {
            adjusted_interval_days: self.optimize(base_interval, forget_prob, confidence),
            adjusted_ease_factor,
            forget_probability: forget_prob,
            confidence,
            reason: self.reason(forget_prob, confidence),
        }
    }
}

impl Default for IntervalOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default(), AdaptiveConfig::default())
    }
}
