use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Local hour at which a new study day begins.
    pub day_boundary_hour: u32,
    pub utc_offset_minutes: i32,
    /// Delay before a same-day (zero-interval) item comes back.
    pub learning_step_minutes: i64,
    pub hard_interval_factor: f64,
    /// Successful reviews more than this far ahead of schedule count as cramming.
    pub premature_margin_minutes: i64,
    pub mastery_min_reviews: i32,
    pub mastery_interval_days: i32,
    /// Interval ladder in days, strictly increasing; the last entry is the cap.
    pub checkpoints: Vec<i32>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            day_boundary_hour: 4,
            utc_offset_minutes: 0,
            learning_step_minutes: 10,
            hard_interval_factor: 0.7,
            premature_margin_minutes: 120,
            mastery_min_reviews: 3,
            mastery_interval_days: 21,
            checkpoints: vec![1, 3, 7, 14, 30, 60, 120, 240, 365],
        }
    }
}

impl BaselineConfig {
    pub fn max_interval_days(&self) -> i32 {
        self.checkpoints.last().copied().unwrap_or(365)
    }

    /// Range checks for the scheduling constants.
    pub fn validate(&self) -> Result<()> {
        if self.day_boundary_hour >= 24 {
            return invalid(format!("day_boundary_hour {} not in 0..24", self.day_boundary_hour));
        }
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return invalid(format!("utc_offset_minutes {} out of range", self.utc_offset_minutes));
        }
        if self.learning_step_minutes <= 0 || self.premature_margin_minutes < 0 {
            return invalid("learning step must be positive and premature margin non-negative");
        }
        if !(self.hard_interval_factor > 0.0 && self.hard_interval_factor < 1.0) {
            return invalid("hard_interval_factor must lie in (0, 1)");
        }
        if self.checkpoints.is_empty() || self.checkpoints[0] < 1 {
            return invalid("checkpoint ladder must start at >= 1 day");
        }
        if self.checkpoints.windows(2).any(|w| w[0] >= w[1]) {
            return invalid("checkpoint ladder must be strictly increasing");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FtrlParams {
    pub alpha: f64,
    pub beta: f64,
    pub l1: f64,
    pub l2: f64,
}

impl Default for FtrlParams {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            beta: 1.0,
            l1: 0.001,
            l2: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdStartConfig {
    pub low_sample_threshold: u64,
    pub high_sample_threshold: u64,
    pub low_confidence: f64,
    pub high_confidence: f64,
    /// Scale of the exponential approach to 1.0 above the high threshold.
    pub saturation_samples: f64,
}

impl Default for ColdStartConfig {
    fn default() -> Self {
        Self {
            low_sample_threshold: 50,
            high_sample_threshold: 200,
            low_confidence: 0.3,
            high_confidence: 0.8,
            saturation_samples: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub default_ease: f64,
    pub min_ease: f64,
    pub max_ease: f64,
    pub ease_adjust_rate: f64,
    pub response_threshold_enabled: bool,
    pub default_response_threshold_ms: f64,
    pub min_response_threshold_ms: f64,
    pub max_response_threshold_ms: f64,
    pub response_std_multiplier: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            default_ease: 2.5,
            min_ease: 1.3,
            max_ease: 3.0,
            ease_adjust_rate: 0.15,
            response_threshold_enabled: true,
            default_response_threshold_ms: 8000.0,
            min_response_threshold_ms: 3000.0,
            max_response_threshold_ms: 15000.0,
            response_std_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub target_forget_probability: f64,
    /// Ratio used when the model is almost certain the item is retained.
    pub stable_extension_ratio: f64,
    pub near_zero_forget: f64,
    pub max_ratio_deviation: f64,
    pub min_confidence: f64,
    pub insufficient_confidence: f64,
    pub high_risk_forget: f64,
    pub stable_forget: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            target_forget_probability: 0.1,
            stable_extension_ratio: 1.2,
            near_zero_forget: 0.01,
            max_ratio_deviation: 0.5,
            min_confidence: 0.01,
            insufficient_confidence: 0.1,
            high_risk_forget: 0.3,
            stable_forget: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub max_samples: u64,
    pub mini_batch_every: u64,
    pub mini_batch_size: usize,
    pub persist_every: u64,
    pub metrics_window: usize,
    pub baseline_retention: f64,
    pub daily_replay_min_samples: u64,
    pub daily_replay_cap: usize,
    pub daily_replay_batch: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_samples: 5000,
            mini_batch_every: 10,
            mini_batch_size: 10,
            persist_every: 10,
            metrics_window: 200,
            baseline_retention: 0.85,
            daily_replay_min_samples: 50,
            daily_replay_cap: 500,
            daily_replay_batch: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Queues at or below this size always receive the item at the tail.
    pub short_queue_max: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { short_queue_max: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub baseline: BaselineConfig,
    pub ftrl: FtrlParams,
    pub cold_start: ColdStartConfig,
    pub adaptive: AdaptiveConfig,
    pub optimizer: OptimizerConfig,
    pub trainer: TrainerConfig,
    pub retry: RetryConfig,
    pub ml_enabled: bool,
    pub prior_path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            baseline: BaselineConfig::default(),
            ftrl: FtrlParams::default(),
            cold_start: ColdStartConfig::default(),
            adaptive: AdaptiveConfig::default(),
            optimizer: OptimizerConfig::default(),
            trainer: TrainerConfig::default(),
            retry: RetryConfig::default(),
            ml_enabled: true,
            prior_path: None,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DANCI_ML_ENABLED") {
            config.ml_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("DANCI_DAY_BOUNDARY_HOUR") {
            config.baseline.day_boundary_hour = val.parse().unwrap_or(4);
        }
        if let Ok(val) = std::env::var("DANCI_UTC_OFFSET_MINUTES") {
            config.baseline.utc_offset_minutes = val.parse().unwrap_or(0);
        }
        if let Ok(val) = std::env::var("DANCI_PRIOR_PATH") {
            if !val.trim().is_empty() {
                config.prior_path = Some(PathBuf::from(val));
            }
        }
        if let Ok(val) = std::env::var("DANCI_MAX_TRAINING_SAMPLES") {
            config.trainer.max_samples = val.parse().unwrap_or(5000);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.baseline.validate()?;

        let f = &self.ftrl;
        if !(f.alpha > 0.0 && f.beta > 0.0 && f.l1 >= 0.0 && f.l2 >= 0.0) {
            return invalid("FTRL requires alpha, beta > 0 and l1, l2 >= 0");
        }

        let c = &self.cold_start;
        if c.low_sample_threshold == 0 || c.low_sample_threshold >= c.high_sample_threshold {
            return invalid("cold start thresholds must satisfy 0 < low < high");
        }
        if !(0.0 < c.low_confidence && c.low_confidence < c.high_confidence && c.high_confidence <= 1.0) {
            return invalid("cold start confidences must satisfy 0 < low < high <= 1");
        }
        if c.saturation_samples <= 0.0 {
            return invalid("saturation_samples must be positive");
        }

        let a = &self.adaptive;
        if !(a.min_ease > 0.0 && a.min_ease < a.max_ease) {
            return invalid("ease bounds must satisfy 0 < min < max");
        }
        if !(a.min_ease..=a.max_ease).contains(&a.default_ease) {
            return invalid("default_ease must lie within the ease bounds");
        }
        if a.min_response_threshold_ms > a.max_response_threshold_ms {
            return invalid("response threshold floor exceeds ceiling");
        }

        let o = &self.optimizer;
        if !(0.0 < o.target_forget_probability && o.target_forget_probability < 1.0) {
            return invalid("target_forget_probability must lie in (0, 1)");
        }
        if !(0.0 < o.max_ratio_deviation && o.max_ratio_deviation < 1.0) {
            return invalid("max_ratio_deviation must lie in (0, 1)");
        }

        let t = &self.trainer;
        if t.max_samples == 0
            || t.mini_batch_every == 0
            || t.mini_batch_size == 0
            || t.persist_every == 0
            || t.metrics_window == 0
            || t.daily_replay_batch == 0
        {
            return invalid("trainer sizes and periods must be positive");
        }
        if !(0.0..=1.0).contains(&t.baseline_retention) {
            return invalid("baseline_retention must lie in [0, 1]");
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Result<()> {
    Err(SchedulerError::InvalidConfig(msg.into()))
}
