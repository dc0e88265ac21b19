//! Deterministic SM-2 style scheduler.
//!
//! Ease follows the SM-2 update `EF' = EF - 0.8 + 0.28q - 0.02q²`. Interval
//! growth is snapped onto a fixed ladder of memory-decay checkpoints instead of
//! growing as an unbounded `interval × EF` product.

use tracing::debug;

use crate::clock::StudyClock;
use crate::config::BaselineConfig;
use crate::error::{Result, SchedulerError};
use crate::types::{Grade, ItemProgress, LearningStatus, ReviewInput, ScheduleResult, StudyMode};

pub const MIN_EASE: f64 = 1.3;
pub const SPELLING_MIN_EASE: f64 = 1.1;
pub const MAX_EASE: f64 = 3.0;

const EASY_BONUS: f64 = 1.3;
const HARD_QUALITY: u8 = 3;
const EASY_QUALITY: u8 = 5;

pub fn ease_floor(mode: StudyMode) -> f64 {
    match mode {
        StudyMode::Recognition => MIN_EASE,
        StudyMode::Spelling => SPELLING_MIN_EASE,
    }
}

pub fn next_ease(current: f64, quality: u8, mode: StudyMode) -> f64 {
    let q = quality as f64;
    let ef = current - 0.8 + 0.28 * q - 0.02 * q * q;
    ef.clamp(ease_floor(mode), MAX_EASE)
}

#[derive(Debug, Clone)]
pub struct BaselineScheduler {
    config: BaselineConfig,
    clock: StudyClock,
}

impl BaselineScheduler {
    pub fn new(config: BaselineConfig) -> Result<Self> {
        config.validate()?;
        let clock = StudyClock::from_config(&config);
        Ok(Self { config, clock })
    }

    pub fn clock(&self) -> &StudyClock {
        &self.clock
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    pub fn schedule(&self, previous: &ItemProgress, grade: Grade, now: i64) -> Result<ScheduleResult> {
        previous.validate()?;
        if now < 0 {
            return Err(SchedulerError::InvalidProgress(format!("review time {now} is negative")));
        }

        let quality = grade.quality();
        let ease_factor = next_ease(previous.ease_factor, quality, grade.mode());
        let mut premature = false;

        let (repetitions, interval_days) = if !grade.is_remembered() {
            (0, 1)
        } else if previous.repetitions == 0 {
            let interval = if quality > HARD_QUALITY { 1 } else { 0 };
            (1, interval)
        } else if self.is_premature(previous, now) {
            premature = true;
            (previous.repetitions, 1)
        } else if quality == HARD_QUALITY {
            let shrunk = (previous.interval_days as f64 * self.config.hard_interval_factor).round() as i32;
            (previous.repetitions + 1, shrunk.max(1))
        } else {
            let bonus = if quality == EASY_QUALITY { EASY_BONUS } else { 1.0 };
            let interval = self.grow_interval(previous.interval_days, ease_factor * bonus);
            (previous.repetitions + 1, interval)
        };

        let status = self.mastery_status(previous, grade, interval_days);

        let next_review_time =
            self.clock
                .next_review_time(now, interval_days, self.config.learning_step_minutes);

        debug!(
            item_id = %previous.item_id,
            quality,
            interval_days,
            ease_factor,
            premature,
            status = status.as_str(),
            "baseline schedule computed"
        );

        Ok(ScheduleResult {
            repetitions,
            interval_days,
            ease_factor,
            next_review_time,
            status,
            premature,
        })
    }

    /// Mastered needs a remembered grade, enough prior reviews, and an
    /// interval of at least `mastery_interval_days`.
    pub fn mastery_status(&self, previous: &ItemProgress, grade: Grade, interval_days: i32) -> LearningStatus {
        if grade.is_remembered()
            && previous.review_count >= self.config.mastery_min_reviews
            && interval_days >= self.config.mastery_interval_days
        {
            LearningStatus::Mastered
        } else {
            LearningStatus::Learning
        }
    }

    /// Schedules the review and folds it into the item's counters.
    pub fn apply(&self, previous: &ItemProgress, input: &ReviewInput, now: i64) -> Result<ItemProgress> {
        if let Some(rt) = input.response_time_ms {
            if rt < 0 {
                return Err(SchedulerError::InvalidProgress(format!("response time {rt} is negative")));
            }
        }
        let result = self.schedule(previous, input.grade, now)?;
        Ok(self.fold_review(previous, input, &result, now))
    }

    /// Writes a computed schedule and the review counters onto a copy of
    /// `previous`. Response times are assumed already validated.
    pub fn fold_review(
        &self,
        previous: &ItemProgress,
        input: &ReviewInput,
        result: &ScheduleResult,
        now: i64,
    ) -> ItemProgress {
        let remembered = input.grade.is_remembered();

        let mut next = previous.clone();
        next.status = result.status;
        next.repetitions = result.repetitions;
        next.interval_days = result.interval_days;
        next.ease_factor = result.ease_factor;
        next.next_review_time = result.next_review_time;
        next.last_review_time = now;
        next.consecutive_correct = if remembered { previous.consecutive_correct + 1 } else { 0 };

        if let Some(rt) = input.response_time_ms {
            let n = previous.review_count as f64;
            next.avg_response_time_ms = (previous.avg_response_time_ms * n + rt as f64) / (n + 1.0);
        }
        next.review_count = previous.review_count + 1;

        if input.grade.mode() == StudyMode::Spelling {
            if remembered {
                next.spell_correct_count += 1;
            } else {
                next.spell_wrong_count += 1;
            }
        }

        next
    }

    fn is_premature(&self, previous: &ItemProgress, now: i64) -> bool {
        if previous.next_review_time <= 0 {
            return false;
        }
        let lead_ms = previous.next_review_time - now;
        lead_ms > self.config.premature_margin_minutes * crate::clock::MINUTE_MS
    }

    fn grow_interval(&self, previous_interval: i32, multiplier: f64) -> i32 {
        let ladder = &self.config.checkpoints;
        if previous_interval <= 0 {
            return ladder.first().copied().unwrap_or_else(|| self.config.max_interval_days());
        }
        let raw = previous_interval as f64 * multiplier;
        let nearest = ladder
            .iter()
            .copied()
            .min_by(|a, b| {
                let da = (*a as f64 - raw).abs();
                let db = (*b as f64 - raw).abs();
                da.total_cmp(&db).then(b.cmp(a))
            })
            .unwrap_or(previous_interval);

        if nearest > previous_interval {
            return nearest;
        }
        // Successful recall never shrinks the interval; step to the next rung.
        ladder
            .iter()
            .copied()
            .find(|c| *c > previous_interval)
            .unwrap_or_else(|| self.config.max_interval_days())
    }
}

impl Default for BaselineScheduler {
    fn default() -> Self {
        let config = BaselineConfig::default();
        Self {
            clock: StudyClock::from_config(&config),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::HOUR_MS;
    use crate::types::{Rating, SpellingOutcome};

    const NOW: i64 = 1_700_000_000_000;

    fn established(review_count: i32, interval_days: i32) -> ItemProgress {
        ItemProgress {
            status: LearningStatus::Learning,
            repetitions: 3,
            interval_days,
            next_review_time: NOW,
            review_count,
            last_review_time: NOW - interval_days as i64 * 24 * HOUR_MS,
            ..ItemProgress::new("word_1")
        }
    }

    #[test]
    fn test_ease_update_formula() {
        assert!((next_ease(2.5, 5, StudyMode::Recognition) - 2.6).abs() < 1e-9);
        assert!((next_ease(2.5, 4, StudyMode::Recognition) - 2.5).abs() < 1e-9);
        assert!((next_ease(2.5, 3, StudyMode::Recognition) - 2.36).abs() < 1e-9);
        assert!((next_ease(1.35, 0, StudyMode::Recognition) - MIN_EASE).abs() < 1e-9);
        assert!((next_ease(1.35, 0, StudyMode::Spelling) - SPELLING_MIN_EASE).abs() < 1e-9);
        assert!((next_ease(2.95, 5, StudyMode::Recognition) - MAX_EASE).abs() < 1e-9);
    }

    #[test]
    fn test_new_item_good_is_one_day() {
        let scheduler = BaselineScheduler::default();
        let result = scheduler
            .schedule(&ItemProgress::new("w"), Rating::Good.into(), NOW)
            .unwrap();
        assert_eq!(result.interval_days, 1);
        assert_eq!(result.repetitions, 1);
        assert_eq!(result.status, LearningStatus::Learning);
    }

    #[test]
    fn test_new_item_hard_comes_back_same_day() {
        let scheduler = BaselineScheduler::default();
        let result = scheduler
            .schedule(&ItemProgress::new("w"), Rating::Hard.into(), NOW)
            .unwrap();
        assert_eq!(result.interval_days, 0);
        assert_eq!(result.next_review_time, NOW + 10 * 60 * 1000);
    }

    #[test]
    fn test_checkpoint_calibration() {
        let scheduler = BaselineScheduler::default();
        let result = scheduler.schedule(&established(5, 5), Rating::Good.into(), NOW).unwrap();
        assert_eq!(result.interval_days, 14);
        assert!(!result.premature);

        let result = scheduler.schedule(&established(5, 1), Rating::Good.into(), NOW).unwrap();
        assert_eq!(result.interval_days, 3);
    }

    #[test]
    fn test_premature_review_resets_to_one_day() {
        let scheduler = BaselineScheduler::default();
        let early = NOW - 6 * HOUR_MS;
        let result = scheduler.schedule(&established(5, 5), Rating::Good.into(), early).unwrap();
        assert_eq!(result.interval_days, 1);
        assert!(result.premature);
    }

    #[test]
    fn test_forgot_branch_ignores_history() {
        let scheduler = BaselineScheduler::default();
        let mut progress = established(20, 120);
        progress.status = LearningStatus::Mastered;
        let result = scheduler.schedule(&progress, Rating::Again.into(), NOW).unwrap();
        assert_eq!(result.interval_days, 1);
        assert_eq!(result.repetitions, 0);
        assert_eq!(result.status, LearningStatus::Learning);
    }

    #[test]
    fn test_hard_shrinks_interval() {
        let scheduler = BaselineScheduler::default();
        let result = scheduler.schedule(&established(5, 10), Rating::Hard.into(), NOW).unwrap();
        assert_eq!(result.interval_days, 7);
        let result = scheduler.schedule(&established(5, 1), Rating::Hard.into(), NOW).unwrap();
        assert_eq!(result.interval_days, 1);
    }

    #[test]
    fn test_mastery_requires_review_floor() {
        let scheduler = BaselineScheduler::default();
        let result = scheduler.schedule(&established(5, 14), Rating::Good.into(), NOW).unwrap();
        assert_eq!(result.interval_days, 30);
        assert_eq!(result.status, LearningStatus::Mastered);

        let result = scheduler.schedule(&established(2, 14), Rating::Good.into(), NOW).unwrap();
        assert_eq!(result.interval_days, 30);
        assert_eq!(result.status, LearningStatus::Learning);
    }

    #[test]
    fn test_mastery_status_follows_interval() {
        let scheduler = BaselineScheduler::default();
        let item = established(5, 14);
        assert_eq!(scheduler.mastery_status(&item, Rating::Good.into(), 21), LearningStatus::Mastered);
        assert_eq!(scheduler.mastery_status(&item, Rating::Good.into(), 15), LearningStatus::Learning);
        assert_eq!(scheduler.mastery_status(&item, Rating::Again.into(), 60), LearningStatus::Learning);
    }

    #[test]
    fn test_rejects_empty_checkpoint_ladder() {
        let config = BaselineConfig {
            checkpoints: vec![],
            ..BaselineConfig::default()
        };
        assert!(matches!(BaselineScheduler::new(config), Err(SchedulerError::InvalidConfig(_))));
        let config = BaselineConfig {
            checkpoints: vec![3, 1],
            ..BaselineConfig::default()
        };
        assert!(BaselineScheduler::new(config).is_err());
        assert!(BaselineScheduler::new(BaselineConfig::default()).is_ok());
    }

    #[test]
    fn test_interval_capped_at_last_checkpoint() {
        let scheduler = BaselineScheduler::default();
        let result = scheduler.schedule(&established(30, 365), Rating::Easy.into(), NOW).unwrap();
        assert_eq!(result.interval_days, 365);
    }

    #[test]
    fn test_rejects_invalid_input() {
        let scheduler = BaselineScheduler::default();
        let mut progress = established(5, 5);
        progress.interval_days = -3;
        assert!(scheduler.schedule(&progress, Rating::Good.into(), NOW).is_err());
        assert!(Grade::from_quality(9, StudyMode::Recognition).is_err());
    }

    #[test]
    fn test_apply_updates_counters() {
        let scheduler = BaselineScheduler::default();
        let input = ReviewInput::new(SpellingOutcome::Perfect).with_response_time(3000);
        let after = scheduler.apply(&ItemProgress::new("w"), &input, NOW).unwrap();
        assert_eq!(after.review_count, 1);
        assert_eq!(after.spell_correct_count, 1);
        assert_eq!(after.consecutive_correct, 1);
        assert_eq!(after.last_review_time, NOW);
        assert!((after.avg_response_time_ms - 3000.0).abs() < 1e-9);

        let input = ReviewInput::new(SpellingOutcome::Failed).with_response_time(5000);
        let after = scheduler.apply(&after, &input, NOW + HOUR_MS).unwrap();
        assert_eq!(after.spell_wrong_count, 1);
        assert_eq!(after.consecutive_correct, 0);
        assert!((after.avg_response_time_ms - 4000.0).abs() < 1e-9);
    }
}
