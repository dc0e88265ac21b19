//! End-to-end scheduling through the review coordinator.

use std::sync::Arc;

use danci_scheduler::clock::{DAY_MS, HOUR_MS};
use danci_scheduler::config::SchedulerConfig;
use danci_scheduler::error::{SchedulerError, StoreError};
use danci_scheduler::ml::{ModelState, PopulationPrior, ReviewContext};
use danci_scheduler::review::ReviewCoordinator;
use danci_scheduler::store::{
    ItemStateStore, MemoryItemStore, MemoryModelStore, MemorySampleStore, ModelStateStore, StoreResult,
    TrainingSampleStore,
};
use danci_scheduler::types::{
    AdjustmentReason, Grade, ItemProgress, LearningStatus, Rating, ReviewInput, SpellingOutcome, StudyMode,
};

const FIXED_TIMESTAMP: i64 = 1_700_000_000_000;

fn coordinator() -> (ReviewCoordinator, Arc<MemoryModelStore>, Arc<MemorySampleStore>) {
    let models = Arc::new(MemoryModelStore::new());
    let samples = Arc::new(MemorySampleStore::new());
    let coordinator = ReviewCoordinator::new(
        SchedulerConfig::default(),
        PopulationPrior::default(),
        Arc::new(MemoryItemStore::new()),
        models.clone(),
        samples.clone(),
    )
    .unwrap();
    (coordinator, models, samples)
}

fn coordinator_with_items(ml_enabled: bool) -> (ReviewCoordinator, Arc<MemoryItemStore>, Arc<MemoryModelStore>) {
    let items = Arc::new(MemoryItemStore::new());
    let models = Arc::new(MemoryModelStore::new());
    let coordinator = ReviewCoordinator::new(
        SchedulerConfig {
            ml_enabled,
            ..SchedulerConfig::default()
        },
        PopulationPrior::default(),
        items.clone(),
        models.clone(),
        Arc::new(MemorySampleStore::new()),
    )
    .unwrap();
    (coordinator, items, models)
}

fn corrupt_model() -> ModelState {
    ModelState {
        z: vec![0.0; 11],
        ..ModelState::default()
    }
}

fn established(review_count: i32, interval_days: i32) -> ItemProgress {
    ItemProgress {
        status: LearningStatus::Learning,
        repetitions: 3,
        interval_days,
        next_review_time: FIXED_TIMESTAMP,
        review_count,
        last_review_time: FIXED_TIMESTAMP - interval_days as i64 * DAY_MS,
        ..ItemProgress::new("word_1")
    }
}

// ============================================================================
// Baseline fixtures
// ============================================================================

#[test]
fn test_on_time_review_reaches_two_week_checkpoint() {
    let (coordinator, _, _) = coordinator();
    let result = coordinator
        .schedule(&established(5, 5), Rating::Good.into(), FIXED_TIMESTAMP)
        .unwrap();
    assert_eq!(result.interval_days, 14);
}

#[test]
fn test_early_review_stays_at_one_day() {
    let (coordinator, _, _) = coordinator();
    let result = coordinator
        .schedule(&established(5, 5), Rating::Good.into(), FIXED_TIMESTAMP - 6 * HOUR_MS)
        .unwrap();
    assert_eq!(result.interval_days, 1);
}

#[test]
fn test_spelling_failure_resets_item() {
    let (coordinator, _, _) = coordinator();
    let result = coordinator
        .schedule(&established(8, 30), SpellingOutcome::Failed.into(), FIXED_TIMESTAMP)
        .unwrap();
    assert_eq!(result.interval_days, 1);
    assert_eq!(result.repetitions, 0);
    assert_eq!(result.status, LearningStatus::Learning);
    assert!(result.ease_factor >= 1.1);
}

// ============================================================================
// Review flow
// ============================================================================

#[test]
fn test_learning_history_builds_confidence() {
    let (coordinator, models, samples) = coordinator();
    let mut now = FIXED_TIMESTAMP;
    for i in 0..60 {
        let rating = if i % 5 == 0 { Rating::Again } else { Rating::Good };
        let input = ReviewInput::new(rating).with_response_time(2000 + (i % 7) * 300);
        coordinator
            .submit_review("learner", &format!("word_{}", i % 12), input, i as usize % 20, 20, now)
            .unwrap();
        now += 20 * 60 * 1000;
    }

    assert_eq!(samples.count("learner").unwrap(), 60);
    let stored = models.load_or_default("learner").unwrap();
    assert_eq!(stored.sample_count, 60);
    assert!(stored.avg_response_time > 2000.0);
    assert!((0.0..=1.0).contains(&stored.user_base_retention));

    let confidence = coordinator.get_confidence("learner").unwrap();
    assert!(confidence >= 0.3);

    let ctx = ReviewContext::new(0, 20, now);
    let adjustment = coordinator.adjust("learner", "word_3", 14, 2.5, &ctx).unwrap();
    assert_ne!(adjustment.reason, AdjustmentReason::InsufficientData);
    assert!((7..=21).contains(&adjustment.adjusted_interval_days));

    let p = coordinator.predict_forget_probability("learner", "word_3", &ctx).unwrap();
    assert!(p > 0.0 && p < 1.0);
}

#[test]
fn test_daily_replay_once_per_study_day() {
    let (coordinator, models, _) = coordinator();
    let mut now = FIXED_TIMESTAMP;
    for i in 0..55 {
        coordinator
            .submit_review("u", &format!("w{i}"), ReviewInput::new(Rating::Good), 0, 1, now)
            .unwrap();
        now += 1000;
    }
    assert_eq!(coordinator.perform_daily_replay("u", now).unwrap(), 55);
    assert_eq!(coordinator.perform_daily_replay("u", now + HOUR_MS).unwrap(), 0);
    assert_eq!(models.load_or_default("u").unwrap().last_replay_time, now);
    assert_eq!(coordinator.perform_daily_replay("u", now + DAY_MS).unwrap(), 55);
}

#[test]
fn test_due_items_follow_study_day() {
    let (coordinator, _, _) = coordinator();
    coordinator
        .submit_review("u", "hard", ReviewInput::new(Rating::Hard), 0, 2, FIXED_TIMESTAMP)
        .unwrap();
    coordinator
        .submit_review("u", "good", ReviewInput::new(Rating::Good), 1, 2, FIXED_TIMESTAMP)
        .unwrap();

    let due: Vec<String> = coordinator
        .due_items("u", FIXED_TIMESTAMP)
        .unwrap()
        .into_iter()
        .map(|p| p.item_id)
        .collect();
    assert_eq!(due, vec!["hard".to_string()]);
    assert_eq!(coordinator.due_items("u", FIXED_TIMESTAMP + DAY_MS).unwrap().len(), 2);
}

#[test]
fn test_raw_quality_grades() {
    let (coordinator, _, _) = coordinator();
    let grade = Grade::from_quality(2, StudyMode::Recognition).unwrap();
    let outcome = coordinator
        .submit_review("u", "w", ReviewInput::new(grade), 0, 1, FIXED_TIMESTAMP)
        .unwrap();
    assert!(outcome.retry_needed);
    assert!(matches!(
        Grade::from_quality(6, StudyMode::Spelling),
        Err(SchedulerError::InvalidQuality(6))
    ));
}

// ============================================================================
// Persistence faults
// ============================================================================

struct UnavailableModelStore;

impl ModelStateStore for UnavailableModelStore {
    fn load_or_default(&self, _user_id: &str) -> StoreResult<ModelState> {
        Err(StoreError::Unavailable("model store offline".to_string()))
    }

    fn upsert(&self, _user_id: &str, _state: &ModelState) -> StoreResult<()> {
        Err(StoreError::Unavailable("model store offline".to_string()))
    }

    fn update_sample_count(&self, _user_id: &str, _sample_count: u64) -> StoreResult<()> {
        Err(StoreError::Unavailable("model store offline".to_string()))
    }

    fn update_response_stats(&self, _user_id: &str, _avg_ms: f64, _std_ms: f64, _count: u64) -> StoreResult<()> {
        Err(StoreError::Unavailable("model store offline".to_string()))
    }

    fn update_learning_metrics(&self, _user_id: &str, _accuracy: f64, _retention: f64) -> StoreResult<()> {
        Err(StoreError::Unavailable("model store offline".to_string()))
    }
}

#[test]
fn test_store_outage_propagates() {
    let coordinator = ReviewCoordinator::new(
        SchedulerConfig::default(),
        PopulationPrior::default(),
        Arc::new(MemoryItemStore::new()),
        Arc::new(UnavailableModelStore),
        Arc::new(MemorySampleStore::new()),
    )
    .unwrap();
    let err = coordinator
        .submit_review("u", "w", ReviewInput::new(Rating::Good), 0, 1, FIXED_TIMESTAMP)
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Store(StoreError::Unavailable(_))));
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = SchedulerConfig::default();
    config.trainer.mini_batch_every = 0;
    assert!(matches!(
        ReviewCoordinator::in_memory(config),
        Err(SchedulerError::InvalidConfig(_))
    ));
}

// ============================================================================
// Unusable stored models
// ============================================================================

#[test]
fn test_corrupt_model_ignored_when_ml_disabled() {
    let (coordinator, _, models) = coordinator_with_items(false);
    models.upsert("u", &corrupt_model()).unwrap();

    let outcome = coordinator
        .submit_review("u", "w", ReviewInput::new(Rating::Good), 0, 1, FIXED_TIMESTAMP)
        .unwrap();
    assert_eq!(outcome.adjustment.reason, AdjustmentReason::MlDisabled);
    assert_eq!(outcome.progress.interval_days, outcome.baseline.interval_days);
    assert!(outcome.training.is_none());

    let ctx = ReviewContext::new(0, 1, FIXED_TIMESTAMP);
    let adjustment = coordinator.adjust("u", "w", 7, 2.5, &ctx).unwrap();
    assert_eq!(adjustment.reason, AdjustmentReason::MlDisabled);
    assert_eq!(models.load_or_default("u").unwrap().z.len(), 11);
}

#[test]
fn test_corrupt_model_falls_back_to_baseline() {
    let (coordinator, _, models) = coordinator_with_items(true);
    models.upsert("u", &corrupt_model()).unwrap();

    let outcome = coordinator
        .submit_review("u", "w", ReviewInput::new(Rating::Good), 0, 1, FIXED_TIMESTAMP)
        .unwrap();
    assert_eq!(outcome.adjustment.reason, AdjustmentReason::MlUnavailable);
    assert_eq!(outcome.progress.interval_days, outcome.baseline.interval_days);
    assert_eq!(outcome.progress.ease_factor, outcome.baseline.ease_factor);
    assert!(outcome.training.is_none());

    let ctx = ReviewContext::new(0, 1, FIXED_TIMESTAMP);
    let adjustment = coordinator.adjust("u", "w", 7, 2.5, &ctx).unwrap();
    assert_eq!(adjustment.reason, AdjustmentReason::MlUnavailable);
    assert_eq!(adjustment.adjusted_interval_days, 7);
    assert_eq!(models.load_or_default("u").unwrap().sample_count, 0);
}

// ============================================================================
// Mastery after ML adjustment
// ============================================================================

#[test]
fn test_shortened_interval_withholds_mastery() {
    let (coordinator, items, _) = coordinator_with_items(true);
    for i in 0..300 {
        coordinator
            .submit_review(
                "u",
                &format!("hard_{i}"),
                ReviewInput::new(Rating::Again),
                i % 20,
                20,
                FIXED_TIMESTAMP + i as i64 * 1000,
            )
            .unwrap();
    }
    assert!(coordinator.get_confidence("u").unwrap() > 0.8);

    let now = FIXED_TIMESTAMP + DAY_MS;
    let item = ItemProgress {
        status: LearningStatus::Learning,
        repetitions: 3,
        interval_days: 14,
        next_review_time: now,
        review_count: 5,
        last_review_time: now - 14 * DAY_MS,
        ..ItemProgress::new("word_1")
    };
    items.put("u", &item).unwrap();

    let outcome = coordinator
        .submit_review("u", "word_1", ReviewInput::new(Rating::Good), 0, 1, now)
        .unwrap();
    assert_eq!(outcome.baseline.interval_days, 30);
    assert_eq!(outcome.baseline.status, LearningStatus::Mastered);
    assert!(outcome.progress.interval_days < 21);
    assert_eq!(outcome.progress.status, LearningStatus::Learning);
}
