//! Feature extraction for the retention model.
//!
//! Layout (every value in [0, 1]):
//! 0 difficulty from ease, 1 hour of day, 2 day of week, 3 session fatigue,
//! 4 log interval, 5 ease, 6 rolling accuracy, 7 log response time,
//! 8 consecutive-correct saturation, 9 log recency, 10 base retention,
//! 11 reserved.

use serde::{Deserialize, Serialize};

use crate::baseline::{MAX_EASE, MIN_EASE};
use crate::clock::{elapsed_days, StudyClock};
use crate::error::{Result, SchedulerError};
use crate::types::ItemProgress;

use super::model_state::ModelState;

pub const FEATURE_DIM: usize = 12;

const MAX_INTERVAL_DAYS: f64 = 365.0;
const MAX_RESPONSE_MS: f64 = 60_000.0;
const MAX_RECENCY_DAYS: f64 = 365.0;
const STREAK_RATE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Validates the dimension and clamps every value into [0, 1].
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.len() != FEATURE_DIM {
            return Err(SchedulerError::DimensionMismatch {
                expected: FEATURE_DIM,
                actual: values.len(),
            });
        }
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(SchedulerError::InvalidFeature(format!("dimension {idx} is not finite")));
        }
        Ok(Self {
            values: values.into_iter().map(|v| v.clamp(0.0, 1.0)).collect(),
        })
    }

    fn from_array(values: [f64; FEATURE_DIM]) -> Self {
        Self {
            values: values
                .iter()
                .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
                .collect(),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `[f1,f2,...]` text form used by the training-sample store.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.values)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let values: Vec<f64> = serde_json::from_str(text)?;
        Self::new(values)
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = SchedulerError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(features: FeatureVector) -> Self {
        features.values
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor {
    clock: StudyClock,
}

impl FeatureExtractor {
    pub fn new(clock: StudyClock) -> Self {
        Self { clock }
    }

    pub fn extract(
        &self,
        item: &ItemProgress,
        session_position: usize,
        session_total: usize,
        model: &ModelState,
        now: i64,
    ) -> FeatureVector {
        let ease_span = MAX_EASE - MIN_EASE;
        let ease_norm = (item.ease_factor - MIN_EASE) / ease_span;

        let fatigue = if session_total == 0 {
            0.0
        } else {
            session_position as f64 / session_total as f64
        };

        let recency = if item.has_been_reviewed() {
            log_scale(elapsed_days(item.last_review_time, now), MAX_RECENCY_DAYS)
        } else {
            1.0
        };

        let streak = item.consecutive_correct.max(0) as f64;

        FeatureVector::from_array([
            1.0 - ease_norm,
            self.clock.hour_of_day(now) as f64 / 23.0,
            self.clock.weekday(now) as f64 / 6.0,
            fatigue,
            log_scale(item.interval_days.max(0) as f64, MAX_INTERVAL_DAYS),
            ease_norm,
            model.global_accuracy,
            log_scale(item.avg_response_time_ms, MAX_RESPONSE_MS),
            2.0 / (1.0 + (-STREAK_RATE * streak).exp()) - 1.0,
            recency,
            model.user_base_retention,
            0.0,
        ])
    }
}

fn log_scale(value: f64, max: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    (value.ln_1p() / max.ln_1p()).min(1.0)
}
