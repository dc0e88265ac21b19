use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::StudyClock;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::types::{AdjustmentReason, ItemProgress, SchedulingAdjustment};

use super::coldstart::ColdStartManager;
use super::features::{FeatureExtractor, FeatureVector};
use super::ftrl::PersonalRetentionPredictor;
use super::model_state::ModelState;
use super::optimizer::IntervalOptimizer;
use super::prior::PopulationPrior;

/// Where in the session a review happened and, once known, how it went.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContext {
    pub session_position: usize,
    pub session_total: usize,
    pub now: i64,
    /// Label of the review being scheduled (0 remembered, 1 forgotten).
    pub outcome_label: Option<u8>,
}

impl ReviewContext {
    pub fn new(session_position: usize, session_total: usize, now: i64) -> Self {
        Self {
            session_position,
            session_total,
            now,
            outcome_label: None,
        }
    }

    pub fn with_outcome(mut self, label: u8) -> Self {
        self.outcome_label = Some(label);
        self
    }
}

/// Overlays the personal retention model on the baseline schedule. With ML
/// disabled the baseline passes through untouched.
#[derive(Debug, Clone)]
pub struct MlEnhancedScheduler {
    extractor: FeatureExtractor,
    cold_start: ColdStartManager,
    optimizer: IntervalOptimizer,
}

impl MlEnhancedScheduler {
    pub fn new(config: &SchedulerConfig, prior: PopulationPrior) -> Self {
        Self {
            extractor: FeatureExtractor::new(StudyClock::from_config(&config.baseline)),
            cold_start: ColdStartManager::new(config.cold_start.clone(), prior),
            optimizer: IntervalOptimizer::new(config.optimizer.clone(), config.adaptive.clone()),
        }
    }

    pub fn cold_start(&self) -> &ColdStartManager {
        &self.cold_start
    }

    pub fn extract_features(&self, item: &ItemProgress, ctx: &ReviewContext, model: &ModelState) -> FeatureVector {
        self.extractor
            .extract(item, ctx.session_position, ctx.session_total, model, ctx.now)
    }

    pub fn get_confidence(&self, predictor: &PersonalRetentionPredictor) -> f64 {
        self.cold_start.confidence(predictor.sample_count())
    }

    pub fn predict_forget_probability(
        &self,
        predictor: &PersonalRetentionPredictor,
        item: &ItemProgress,
        ctx: &ReviewContext,
    ) -> Result<f64> {
        let features = self.extract_features(item, ctx, predictor.state());
        self.cold_start
            .blended_predict(predictor, &features, predictor.sample_count())
    }

    pub fn adjust(
        &self,
        predictor: &PersonalRetentionPredictor,
        base_interval: i32,
        base_ease: f64,
        item: &ItemProgress,
        ctx: &ReviewContext,
        ml_enabled: bool,
    ) -> SchedulingAdjustment {
        if !ml_enabled {
            return SchedulingAdjustment::unchanged(base_interval, base_ease, AdjustmentReason::MlDisabled);
        }

        let confidence = self.get_confidence(predictor);
        if confidence < self.optimizer.config().min_confidence {
            return SchedulingAdjustment {
                confidence,
                ..SchedulingAdjustment::unchanged(base_interval, base_ease, AdjustmentReason::InsufficientData)
            };
        }

        let forget_prob = match self.predict_forget_probability(predictor, item, ctx) {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, item_id = %item.item_id, "forget prediction failed, keeping baseline");
                return SchedulingAdjustment::unchanged(base_interval, base_ease, AdjustmentReason::MlUnavailable);
            }
        };

        let adjustment = self.optimizer.compute_adjustment(
            base_interval,
            base_ease,
            forget_prob,
            confidence,
            ctx.outcome_label.map(f64::from),
        );

        debug!(
            item_id = %item.item_id,
            base_interval,
            adjusted_interval = adjustment.adjusted_interval_days,
            forget_prob,
            confidence,
            reason = adjustment.reason.as_str(),
            "ml adjustment computed"
        );

        adjustment
    }
}

impl Default for MlEnhancedScheduler {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default(), PopulationPrior::default())
    }
}
