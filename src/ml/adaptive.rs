//! Bounded adjustment primitives driven by the forget probability.

use crate::config::AdaptiveConfig;

#[derive(Debug, Clone)]
pub struct AdaptiveEaseFactor {
    config: AdaptiveConfig,
}

impl AdaptiveEaseFactor {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self { config }
    }

    /// Ease implied by a forget probability: 0 maps to the ceiling, 1 to the floor.
    fn ease_for_forget_probability(&self, forget_prob: f64) -> f64 {
        let p = forget_prob.clamp(0.0, 1.0);
        self.config.min_ease + (1.0 - p) * (self.config.max_ease - self.config.min_ease)
    }

    pub fn predict_initial_ef(&self, forget_prob: f64, confidence: f64) -> f64 {
        let c = confidence.clamp(0.0, 1.0);
        let predicted = self.ease_for_forget_probability(forget_prob);
        let ef = (1.0 - c) * self.config.default_ease + c * predicted;
        self.clamp(ef)
    }

    /// `actual_outcome` uses the training label convention: 1.0 forgotten,
    /// 0.0 remembered. Over-predicting forgetting raises the ease.
    pub fn adjust_ef(&self, current_ef: f64, forget_prob: f64, actual_outcome: f64, confidence: f64) -> f64 {
        let c = confidence.clamp(0.0, 1.0);
        let delta = (forget_prob - actual_outcome) * self.config.ease_adjust_rate * c;
        self.clamp(current_ef + delta)
    }

    fn clamp(&self, ef: f64) -> f64 {
        if !ef.is_finite() {
            return self.config.default_ease;
        }
        ef.clamp(self.config.min_ease, self.config.max_ease)
    }
}

impl Default for AdaptiveEaseFactor {
    fn default() -> Self {
        Self::new(AdaptiveConfig::default())
    }
}

/// Response-time threshold separating fluent from hesitant answers.
#[derive(Debug, Clone)]
pub struct AdaptiveResponseThreshold {
    config: AdaptiveConfig,
}

impl AdaptiveResponseThreshold {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self { config }
    }

    pub fn compute_threshold(&self, avg_ms: Option<f64>, std_ms: Option<f64>, enabled: bool) -> f64 {
        let cfg = &self.config;
        let (Some(avg), Some(std)) = (avg_ms, std_ms) else {
            return cfg.default_response_threshold_ms;
        };
        if !enabled || !avg.is_finite() || !std.is_finite() || avg <= 0.0 || std < 0.0 {
            return cfg.default_response_threshold_ms;
        }
        (avg + cfg.response_std_multiplier * std)
            .clamp(cfg.min_response_threshold_ms, cfg.max_response_threshold_ms)
    }

    pub fn is_slow(&self, response_time_ms: f64, avg_ms: Option<f64>, std_ms: Option<f64>) -> bool {
        response_time_ms > self.compute_threshold(avg_ms, std_ms, self.config.response_threshold_enabled)
    }
}

impl Default for AdaptiveResponseThreshold {
    fn default() -> Self {
        Self::new(AdaptiveConfig::default())
    }
}
