//! Per-review orchestration.
//!
//! `ReviewCoordinator` owns one lazily loaded predictor per user and runs the
//! full review flow while holding that user's lock, so a user's model and
//! training log only ever see one writer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::baseline::BaselineScheduler;
use crate::clock::{DueLabel, StudyClock};
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::ml::{
    AdaptiveResponseThreshold, MlEnhancedScheduler, OnlineTrainer, PersonalRetentionPredictor, PopulationPrior,
    ReviewContext, TrainingReport,
};
use crate::session::{RandomSource, RetryPolicy, RetryQueue};
use crate::store::{
    ItemStateStore, MemoryItemStore, MemoryModelStore, MemorySampleStore, ModelStateStore, TrainingSampleStore,
};
use crate::types::{AdjustmentReason, Grade, ItemProgress, ReviewInput, ScheduleResult, SchedulingAdjustment};

type PredictorHandle = Arc<Mutex<PersonalRetentionPredictor>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub user_id: String,
    pub item_id: String,
    pub progress: ItemProgress,
    pub baseline: ScheduleResult,
    pub adjustment: SchedulingAdjustment,
    pub due_label: DueLabel,
    pub training: Option<TrainingReport>,
    /// Whether the item should reappear later in the current session.
    pub retry_needed: bool,
    pub retry_index: Option<usize>,
}

pub struct ReviewCoordinator {
    config: SchedulerConfig,
    baseline: BaselineScheduler,
    enhanced: MlEnhancedScheduler,
    trainer: OnlineTrainer,
    response_threshold: AdaptiveResponseThreshold,
    items: Arc<dyn ItemStateStore>,
    models: Arc<dyn ModelStateStore>,
    predictors: Mutex<HashMap<String, PredictorHandle>>,
}

impl ReviewCoordinator {
    pub fn new(
        config: SchedulerConfig,
        prior: PopulationPrior,
        items: Arc<dyn ItemStateStore>,
        models: Arc<dyn ModelStateStore>,
        samples: Arc<dyn TrainingSampleStore>,
    ) -> Result<Self> {
        config.validate()?;
        let clock = StudyClock::from_config(&config.baseline);
        let trainer = OnlineTrainer::new(
            config.trainer.clone(),
            config.cold_start.low_sample_threshold,
            clock,
            Arc::clone(&models),
            samples,
        );

        Ok(Self {
            baseline: BaselineScheduler::new(config.baseline.clone())?,
            enhanced: MlEnhancedScheduler::new(&config, prior),
            response_threshold: AdaptiveResponseThreshold::new(config.adaptive.clone()),
            trainer,
            items,
            models,
            predictors: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Coordinator over in-process stores, with the prior loaded from
    /// `config.prior_path` when set.
    pub fn in_memory(config: SchedulerConfig) -> Result<Self> {
        let prior = PopulationPrior::load(config.prior_path.as_deref());
        Self::new(
            config,
            prior,
            Arc::new(MemoryItemStore::new()),
            Arc::new(MemoryModelStore::new()),
            Arc::new(MemorySampleStore::new()),
        )
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> &StudyClock {
        self.baseline.clock()
    }

    /// Baseline schedule only; no state is read or written.
    pub fn schedule(&self, previous: &ItemProgress, grade: Grade, now: i64) -> Result<ScheduleResult> {
        self.baseline.schedule(previous, grade, now)
    }

    pub fn submit_review(
        &self,
        user_id: &str,
        item_id: &str,
        input: ReviewInput,
        session_position: usize,
        session_total: usize,
        now: i64,
    ) -> Result<ReviewOutcome> {
        let handle = self.overlay_predictor(user_id)?;
        let mut predictor = handle.as_ref().map(|h| h.lock());

        let previous = self.item_or_new(user_id, item_id)?;
        let ctx = ReviewContext::new(session_position, session_total, now).with_outcome(input.grade.label());

        let baseline = self.baseline.schedule(&previous, input.grade, now)?;
        let mut progress = self.baseline.fold_review(&previous, &input, &baseline, now);

        let adjustment = self.overlay(
            predictor.as_deref(),
            baseline.interval_days,
            baseline.ease_factor,
            &previous,
            &ctx,
        );
        if adjusts_schedule(&adjustment) {
            progress.interval_days = adjustment.adjusted_interval_days;
            progress.ease_factor = adjustment.adjusted_ease_factor;
            progress.status = self
                .baseline
                .mastery_status(&previous, input.grade, adjustment.adjusted_interval_days);
            progress.next_review_time = self.clock().next_review_time(
                now,
                adjustment.adjusted_interval_days,
                self.config.baseline.learning_step_minutes,
            );
        }

        let training = match predictor.as_deref_mut() {
            Some(predictor) => {
                let features = self.enhanced.extract_features(&previous, &ctx, predictor.state());
                let report = self.trainer.on_review_completed(
                    user_id,
                    predictor,
                    item_id,
                    &features,
                    input.grade.is_remembered(),
                    input.response_time_ms.map(|rt| rt as f64),
                    now,
                )?;
                Some(report)
            }
            None => None,
        };

        self.items.put(user_id, &progress)?;

        debug!(
            user_id = %user_id,
            item_id = %item_id,
            interval_days = progress.interval_days,
            reason = adjustment.reason.as_str(),
            "review recorded"
        );

        Ok(ReviewOutcome {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            due_label: self.clock().due_label(progress.next_review_time, now),
            progress,
            baseline,
            adjustment,
            training,
            retry_needed: !input.grade.is_remembered(),
            retry_index: None,
        })
    }

    /// `submit_review` followed by retry planning in the live session queue.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_session_review(
        &self,
        user_id: &str,
        item_id: &str,
        input: ReviewInput,
        session_position: usize,
        session_total: usize,
        now: i64,
        queue: &mut RetryQueue,
        policy: RetryPolicy,
        random: &mut dyn RandomSource,
    ) -> Result<ReviewOutcome> {
        let mut outcome = self.submit_review(user_id, item_id, input, session_position, session_total, now)?;
        if outcome.retry_needed {
            outcome.retry_index = Some(queue.push_failed(item_id, policy, random));
        } else {
            queue.remove(item_id);
        }
        Ok(outcome)
    }

    /// ML overlay for an arbitrary base schedule of a stored item.
    pub fn adjust(
        &self,
        user_id: &str,
        item_id: &str,
        base_interval: i32,
        base_ease: f64,
        ctx: &ReviewContext,
    ) -> Result<SchedulingAdjustment> {
        let Some(handle) = self.overlay_predictor(user_id)? else {
            return Ok(self.overlay(None, base_interval, base_ease, &ItemProgress::new(item_id), ctx));
        };
        let item = self.item_or_new(user_id, item_id)?;
        let predictor = handle.lock();
        Ok(self.overlay(Some(&*predictor), base_interval, base_ease, &item, ctx))
    }

    pub fn predict_forget_probability(&self, user_id: &str, item_id: &str, ctx: &ReviewContext) -> Result<f64> {
        let item = self.item_or_new(user_id, item_id)?;
        let handle = self.predictor(user_id)?;
        let predictor = handle.lock();
        self.enhanced.predict_forget_probability(&predictor, &item, ctx)
    }

    pub fn get_confidence(&self, user_id: &str) -> Result<f64> {
        let handle = self.predictor(user_id)?;
        let predictor = handle.lock();
        Ok(self.enhanced.get_confidence(&predictor))
    }

    /// The user's slow-answer threshold in milliseconds.
    pub fn response_threshold(&self, user_id: &str) -> Result<f64> {
        let handle = self.predictor(user_id)?;
        let predictor = handle.lock();
        let state = predictor.state();
        let (avg, std) = if state.sample_count > 0 {
            (Some(state.avg_response_time), Some(state.std_response_time))
        } else {
            (None, None)
        };
        Ok(self
            .response_threshold
            .compute_threshold(avg, std, self.config.adaptive.response_threshold_enabled))
    }

    pub fn perform_daily_replay(&self, user_id: &str, now: i64) -> Result<usize> {
        let handle = self.predictor(user_id)?;
        let mut predictor = handle.lock();
        self.trainer.perform_daily_replay(user_id, &mut predictor, now)
    }

    /// Items due before the end of the current study day, earliest first.
    pub fn due_items(&self, user_id: &str, now: i64) -> Result<Vec<ItemProgress>> {
        let end = self.clock().end_of_study_day(now);
        Ok(self.items.due_before(user_id, end)?)
    }

    /// Drops the cached predictor; the next call reloads it from the store.
    pub fn evict(&self, user_id: &str) -> bool {
        self.predictors.lock().remove(user_id).is_some()
    }

    fn item_or_new(&self, user_id: &str, item_id: &str) -> Result<ItemProgress> {
        Ok(self
            .items
            .get(user_id, item_id)?
            .unwrap_or_else(|| ItemProgress::new(item_id)))
    }

    /// ML overlay, or the base values when there is no usable predictor.
    fn overlay(
        &self,
        predictor: Option<&PersonalRetentionPredictor>,
        base_interval: i32,
        base_ease: f64,
        item: &ItemProgress,
        ctx: &ReviewContext,
    ) -> SchedulingAdjustment {
        match predictor {
            Some(predictor) => self.enhanced.adjust(predictor, base_interval, base_ease, item, ctx, true),
            None if !self.config.ml_enabled => {
                SchedulingAdjustment::unchanged(base_interval, base_ease, AdjustmentReason::MlDisabled)
            }
            None => SchedulingAdjustment::unchanged(base_interval, base_ease, AdjustmentReason::MlUnavailable),
        }
    }

    /// Predictor for the scheduling path. `None` when ML is disabled or the
    /// stored model cannot be restored; store outages still propagate.
    fn overlay_predictor(&self, user_id: &str) -> Result<Option<PredictorHandle>> {
        if !self.config.ml_enabled {
            return Ok(None);
        }
        match self.predictor(user_id) {
            Ok(handle) => Ok(Some(handle)),
            Err(err @ SchedulerError::Store(_)) => Err(err),
            Err(err) => {
                warn!(error = %err, user_id = %user_id, "stored model unusable, scheduling with baseline only");
                Ok(None)
            }
        }
    }

    fn predictor(&self, user_id: &str) -> Result<PredictorHandle> {
        let mut predictors = self.predictors.lock();
        if let Some(handle) = predictors.get(user_id) {
            return Ok(Arc::clone(handle));
        }

        let state = self.models.load_or_default(user_id)?;
        let mut predictor = PersonalRetentionPredictor::from_state(self.config.ftrl, state)?;
        if self.enhanced.cold_start().initialize_predictor(&mut predictor)? {
            info!(user_id = %user_id, "personal model initialized from population prior");
        }

        let handle = Arc::new(Mutex::new(predictor));
        predictors.insert(user_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }
}

fn adjusts_schedule(adjustment: &SchedulingAdjustment) -> bool {
    !matches!(
        adjustment.reason,
        AdjustmentReason::MlDisabled | AdjustmentReason::MlUnavailable
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DAY_MS;
    use crate::session::SeededRandom;
    use crate::types::{LearningStatus, Rating};

    const NOW: i64 = 1_700_000_000_000;

    fn coordinator(ml_enabled: bool) -> ReviewCoordinator {
        ReviewCoordinator::in_memory(SchedulerConfig {
            ml_enabled,
            ..SchedulerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_first_review_creates_item() {
        let coordinator = coordinator(true);
        let outcome = coordinator
            .submit_review("u", "apple", ReviewInput::new(Rating::Good).with_response_time(2400), 0, 20, NOW)
            .unwrap();
        assert_eq!(outcome.baseline.interval_days, 1);
        assert_eq!(outcome.progress.interval_days, 1);
        assert_eq!(outcome.progress.review_count, 1);
        assert_eq!(outcome.progress.status, LearningStatus::Learning);
        assert_eq!(outcome.training.as_ref().unwrap().sample_count, 1);
        assert!(!outcome.retry_needed);
        assert_eq!(outcome.due_label, DueLabel::Tomorrow);
        assert_eq!(coordinator.due_items("u", NOW).unwrap().len(), 0);
        assert_eq!(coordinator.due_items("u", NOW + DAY_MS).unwrap().len(), 1);
    }

    #[test]
    fn test_disabled_ml_matches_baseline() {
        let coordinator = coordinator(false);
        let outcome = coordinator
            .submit_review("u", "apple", ReviewInput::new(Rating::Easy), 0, 1, NOW)
            .unwrap();
        assert_eq!(outcome.adjustment.reason, AdjustmentReason::MlDisabled);
        assert_eq!(outcome.progress.interval_days, outcome.baseline.interval_days);
        assert_eq!(outcome.progress.ease_factor, outcome.baseline.ease_factor);
        assert!(outcome.training.is_none());
        assert_eq!(coordinator.get_confidence("u").unwrap(), 0.0);
    }

    #[test]
    fn test_failed_review_goes_to_retry_queue() {
        let coordinator = coordinator(true);
        let mut queue = RetryQueue::default();
        let mut random = SeededRandom::new(1);
        let outcome = coordinator
            .submit_session_review(
                "u",
                "pear",
                ReviewInput::new(Rating::Again),
                2,
                10,
                NOW,
                &mut queue,
                RetryPolicy::HalfWay,
                &mut random,
            )
            .unwrap();
        assert!(outcome.retry_needed);
        assert_eq!(outcome.retry_index, Some(0));
        assert_eq!(outcome.progress.interval_days, 1);
        assert!(queue.contains("pear"));

        coordinator
            .submit_session_review(
                "u",
                "pear",
                ReviewInput::new(Rating::Good),
                3,
                10,
                NOW + 60_000,
                &mut queue,
                RetryPolicy::HalfWay,
                &mut random,
            )
            .unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_predictor_reloads_from_store() {
        let coordinator = coordinator(true);
        for i in 0..10 {
            coordinator
                .submit_review("u", &format!("w{i}"), ReviewInput::new(Rating::Good), i, 10, NOW + i as i64)
                .unwrap();
        }
        let before = coordinator.get_confidence("u").unwrap();
        assert!(coordinator.evict("u"));
        assert_eq!(coordinator.get_confidence("u").unwrap(), before);
        assert!(before > 0.0);
    }

    #[test]
    fn test_response_threshold_defaults_without_history() {
        let coordinator = coordinator(true);
        assert_eq!(coordinator.response_threshold("new-user").unwrap(), 8000.0);
    }
}
