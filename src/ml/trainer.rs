//! Online training pipeline for the personal retention model.
//!
//! Each completed review becomes one FTRL step and one row in the training
//! log. Every `mini_batch_every` samples the newest rows are replayed as a
//! mini-batch correction, and every `persist_every` samples the full model is
//! written back. A larger replay runs at most once per study day.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::StudyClock;
use crate::config::TrainerConfig;
use crate::error::Result;
use crate::store::{ModelStateStore, TrainingSampleStore};
use crate::types::{TrainingSample, LABEL_FORGOTTEN, LABEL_REMEMBERED};

use super::features::FeatureVector;
use super::ftrl::PersonalRetentionPredictor;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningMetrics {
    pub accuracy: f64,
    pub retention: f64,
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub prediction_error: f64,
    pub sample_count: u64,
    pub trimmed: usize,
    pub mini_batch_applied: bool,
    pub model_persisted: bool,
    pub metrics: Option<LearningMetrics>,
}

/// Windowed retention and accuracy over recent samples.
///
/// Retention leans on `baseline_retention` until the window holds
/// `cold_start_samples` rows. Returns `None` for an empty window.
pub fn compute_metrics(
    samples: &[TrainingSample],
    baseline_retention: f64,
    cold_start_samples: u64,
) -> Option<LearningMetrics> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let remembered = samples
        .iter()
        .filter(|s| s.outcome_label == LABEL_REMEMBERED)
        .count() as f64;
    let observed = remembered / n;
    let weight = (n / cold_start_samples.max(1) as f64).min(1.0);
    let retention = weight * observed + (1.0 - weight) * baseline_retention;

    let mean_error = samples.iter().map(|s| s.prediction_error).sum::<f64>() / n;
    let accuracy = (1.0 - mean_error).clamp(0.0, 1.0);

    Some(LearningMetrics {
        accuracy,
        retention: retention.clamp(0.0, 1.0),
        window: samples.len(),
    })
}

pub struct OnlineTrainer {
    config: TrainerConfig,
    cold_start_samples: u64,
    clock: StudyClock,
    models: Arc<dyn ModelStateStore>,
    samples: Arc<dyn TrainingSampleStore>,
}

impl OnlineTrainer {
    pub fn new(
        config: TrainerConfig,
        cold_start_samples: u64,
        clock: StudyClock,
        models: Arc<dyn ModelStateStore>,
        samples: Arc<dyn TrainingSampleStore>,
    ) -> Self {
        Self {
            config,
            cold_start_samples,
            clock,
            models,
            samples,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    #[allow(clippy::too_many_arguments)]
    pub fn on_review_completed(
        &self,
        user_id: &str,
        predictor: &mut PersonalRetentionPredictor,
        item_id: &str,
        features: &FeatureVector,
        is_correct: bool,
        response_time_ms: Option<f64>,
        now: i64,
    ) -> Result<TrainingReport> {
        let label = if is_correct { LABEL_REMEMBERED } else { LABEL_FORGOTTEN };

        if let Some(rt) = response_time_ms.filter(|rt| rt.is_finite() && *rt >= 0.0) {
            predictor.record_response_time(rt);
            let state = predictor.state();
            self.models.update_response_stats(
                user_id,
                state.avg_response_time,
                state.std_response_time,
                state.response_time_count,
            )?;
        }

        let prediction_error = predictor.update(features, label)?;
        predictor.mark_trained(now);

        self.samples.append(
            user_id,
            TrainingSample {
                item_id: item_id.to_string(),
                feature_vector_json: features.to_json()?,
                outcome_label: label,
                timestamp: now,
                prediction_error,
            },
        )?;

        let mut trimmed = 0;
        if self.samples.count(user_id)? > self.config.max_samples {
            trimmed = self.samples.retain_newest(user_id, self.config.max_samples as usize)?;
            debug!(user_id = %user_id, trimmed, "training log trimmed");
        }

        let sample_count = predictor.sample_count();
        self.models.update_sample_count(user_id, sample_count)?;

        let metrics = self.refresh_metrics(user_id, predictor)?;

        let mini_batch_applied = sample_count % self.config.mini_batch_every == 0;
        if mini_batch_applied {
            self.mini_batch(user_id, predictor)?;
        }

        let model_persisted = sample_count % self.config.persist_every == 0;
        if model_persisted {
            self.models.upsert(user_id, &predictor.snapshot())?;
            debug!(user_id = %user_id, sample_count, version = predictor.version(), "model persisted");
        }

        Ok(TrainingReport {
            prediction_error,
            sample_count,
            trimmed,
            mini_batch_applied,
            model_persisted,
            metrics,
        })
    }

    /// Replays up to `daily_replay_cap` of the newest samples, oldest first.
    /// Runs at most once per study day and only once enough samples exist.
    /// Returns the number of samples replayed.
    pub fn perform_daily_replay(
        &self,
        user_id: &str,
        predictor: &mut PersonalRetentionPredictor,
        now: i64,
    ) -> Result<usize> {
        let last = predictor.state().last_replay_time;
        if last > 0 && self.clock.same_study_day(last, now) {
            debug!(user_id = %user_id, "daily replay already ran this study day");
            return Ok(0);
        }

        let total = self.samples.count(user_id)?;
        if total < self.config.daily_replay_min_samples {
            debug!(user_id = %user_id, total, "not enough samples for daily replay");
            return Ok(0);
        }

        let total = total as usize;
        let mut offset = total.saturating_sub(self.config.daily_replay_cap);
        let mut replayed = 0;
        while offset < total {
            let batch = self
                .samples
                .batch(user_id, offset, self.config.daily_replay_batch)?;
            if batch.is_empty() {
                break;
            }
            offset += batch.len();
            replayed += self.replay(predictor, &batch);
        }

        predictor.mark_replayed(now);
        self.models.upsert(user_id, &predictor.snapshot())?;
        info!(user_id = %user_id, replayed, version = predictor.version(), "daily replay finished");
        Ok(replayed)
    }

    fn mini_batch(&self, user_id: &str, predictor: &mut PersonalRetentionPredictor) -> Result<()> {
        let recent = self.samples.recent(user_id, self.config.mini_batch_size)?;
        let replayed = self.replay(predictor, &recent);
        debug!(user_id = %user_id, replayed, "mini-batch correction applied");
        Ok(())
    }

    fn refresh_metrics(
        &self,
        user_id: &str,
        predictor: &mut PersonalRetentionPredictor,
    ) -> Result<Option<LearningMetrics>> {
        let window = self.samples.recent(user_id, self.config.metrics_window)?;
        let Some(metrics) = compute_metrics(&window, self.config.baseline_retention, self.cold_start_samples) else {
            return Ok(None);
        };
        predictor.set_learning_metrics(metrics.accuracy, metrics.retention);
        self.models
            .update_learning_metrics(user_id, metrics.accuracy, metrics.retention)?;
        Ok(Some(metrics))
    }

    /// Unreadable rows are skipped rather than aborting the pass.
    fn replay(&self, predictor: &mut PersonalRetentionPredictor, samples: &[TrainingSample]) -> usize {
        let mut replayed = 0;
        for sample in samples {
            let step = FeatureVector::from_json(&sample.feature_vector_json)
                .and_then(|features| predictor.reinforce(&features, sample.outcome_label));
            match step {
                Ok(_) => replayed += 1,
                Err(err) => warn!(error = %err, item_id = %sample.item_id, "skipping unreadable training sample"),
            }
        }
        replayed
    }
}
