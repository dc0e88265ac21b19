use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// Lowest quality still counted as "remembered".
pub const REMEMBERED_QUALITY: u8 = 3;
pub const MAX_QUALITY: u8 = 5;

pub const LABEL_REMEMBERED: u8 = 0;
pub const LABEL_FORGOTTEN: u8 = 1;

// ========== Item state ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LearningStatus {
    #[default]
    New,
    Learning,
    Mastered,
}

impl LearningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Learning => "LEARNING",
            Self::Mastered => "MASTERED",
        }
    }
}

impl FromStr for LearningStatus {
    type Err = SchedulerError;

    /// Case-insensitive; unknown values are rejected rather than read as `New`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "LEARNING" => Ok(Self::Learning),
            "MASTERED" => Ok(Self::Mastered),
            _ => Err(SchedulerError::InvalidProgress(format!("unknown learning status {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyMode {
    #[default]
    Recognition,
    Spelling,
}

/// Per item, per collection review progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
    pub item_id: String,
    pub status: LearningStatus,
    pub repetitions: i32,
    pub interval_days: i32,
    pub next_review_time: i64,
    pub ease_factor: f64,
    pub review_count: i32,
    pub spell_correct_count: i32,
    pub spell_wrong_count: i32,
    pub consecutive_correct: i32,
    pub avg_response_time_ms: f64,
    /// 0 means never reviewed.
    pub last_review_time: i64,
}

impl ItemProgress {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            status: LearningStatus::New,
            repetitions: 0,
            interval_days: 0,
            next_review_time: 0,
            ease_factor: 2.5,
            review_count: 0,
            spell_correct_count: 0,
            spell_wrong_count: 0,
            consecutive_correct: 0,
            avg_response_time_ms: 0.0,
            last_review_time: 0,
        }
    }

    pub fn is_new(&self) -> bool {
        self.status == LearningStatus::New || self.review_count == 0
    }

    pub fn has_been_reviewed(&self) -> bool {
        self.last_review_time > 0
    }

    pub fn validate(&self) -> Result<()> {
        let counters = [
            ("repetitions", self.repetitions),
            ("intervalDays", self.interval_days),
            ("reviewCount", self.review_count),
            ("spellCorrectCount", self.spell_correct_count),
            ("spellWrongCount", self.spell_wrong_count),
            ("consecutiveCorrect", self.consecutive_correct),
        ];
        if let Some((name, value)) = counters.iter().find(|(_, v)| *v < 0) {
            return Err(SchedulerError::InvalidProgress(format!("{name} is negative ({value})")));
        }
        if !self.ease_factor.is_finite() || self.ease_factor <= 0.0 {
            return Err(SchedulerError::InvalidProgress(format!(
                "easeFactor {} is not a positive number",
                self.ease_factor
            )));
        }
        if !self.avg_response_time_ms.is_finite() || self.avg_response_time_ms < 0.0 {
            return Err(SchedulerError::InvalidProgress(
                "avgResponseTimeMs must be a non-negative number".to_string(),
            ));
        }
        if self.next_review_time < 0 || self.last_review_time < 0 {
            return Err(SchedulerError::InvalidProgress("timestamps must be non-negative".to_string()));
        }
        Ok(())
    }
}

// ========== Grades ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub fn quality(&self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 3,
            Self::Good => 4,
            Self::Easy => 5,
        }
    }

    pub fn from_correct(is_correct: bool, response_time_ms: i64) -> Self {
        if !is_correct {
            return Self::Again;
        }
        if response_time_ms < 2000 {
            Self::Easy
        } else if response_time_ms < 5000 {
            Self::Good
        } else {
            Self::Hard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpellingOutcome {
    Perfect,
    Hinted,
    RetrySuccess,
    Failed,
}

impl SpellingOutcome {
    pub fn quality(&self) -> u8 {
        match self {
            Self::Perfect => 5,
            Self::Hinted => 4,
            Self::RetrySuccess => 3,
            Self::Failed => 1,
        }
    }
}

/// A validated review quality together with the mode it was earned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grade {
    quality: u8,
    mode: StudyMode,
}

impl Grade {
    pub fn from_quality(quality: u8, mode: StudyMode) -> Result<Self> {
        if quality > MAX_QUALITY {
            return Err(SchedulerError::InvalidQuality(quality));
        }
        Ok(Self { quality, mode })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    pub fn is_remembered(&self) -> bool {
        self.quality >= REMEMBERED_QUALITY
    }

    /// Training label: 0 remembered, 1 forgotten.
    pub fn label(&self) -> u8 {
        if self.is_remembered() {
            LABEL_REMEMBERED
        } else {
            LABEL_FORGOTTEN
        }
    }
}

impl From<Rating> for Grade {
    fn from(rating: Rating) -> Self {
        Self {
            quality: rating.quality(),
            mode: StudyMode::Recognition,
        }
    }
}

impl From<SpellingOutcome> for Grade {
    fn from(outcome: SpellingOutcome) -> Self {
        Self {
            quality: outcome.quality(),
            mode: StudyMode::Spelling,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub grade: Grade,
    pub response_time_ms: Option<i64>,
}

impl ReviewInput {
    pub fn new(grade: impl Into<Grade>) -> Self {
        Self {
            grade: grade.into(),
            response_time_ms: None,
        }
    }

    pub fn with_response_time(mut self, response_time_ms: i64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }
}

// ========== Scheduling outputs ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    pub repetitions: i32,
    pub interval_days: i32,
    pub ease_factor: f64,
    pub next_review_time: i64,
    pub status: LearningStatus,
    pub premature: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    MlDisabled,
    MlUnavailable,
    InsufficientData,
    ElevatedRisk,
    StableMemory,
    MinorTuning,
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MlDisabled => "ml_disabled",
            Self::MlUnavailable => "ml_unavailable",
            Self::InsufficientData => "insufficient_data",
            Self::ElevatedRisk => "elevated_risk",
            Self::StableMemory => "stable_memory",
            Self::MinorTuning => "minor_tuning",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::MlDisabled => "personalization disabled, baseline schedule kept",
            Self::MlUnavailable => "personal model unavailable, baseline schedule kept",
            Self::InsufficientData => "insufficient data: schedule stays close to baseline",
            Self::ElevatedRisk => "shorten: elevated forgetting risk",
            Self::StableMemory => "extend: stable memory",
            Self::MinorTuning => "minor tuning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingAdjustment {
    pub adjusted_interval_days: i32,
    pub adjusted_ease_factor: f64,
    pub forget_probability: f64,
    pub confidence: f64,
    pub reason: AdjustmentReason,
}

impl SchedulingAdjustment {
    pub fn unchanged(interval_days: i32, ease_factor: f64, reason: AdjustmentReason) -> Self {
        Self {
            adjusted_interval_days: interval_days,
            adjusted_ease_factor: ease_factor,
            forget_probability: 0.0,
            confidence: 0.0,
            reason,
        }
    }
}

// ========== Training log ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSample {
    pub item_id: String,
    pub feature_vector_json: String,
    pub outcome_label: u8,
    pub timestamp: i64,
    pub prediction_error: f64,
}
