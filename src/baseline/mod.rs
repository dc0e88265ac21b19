//! Baseline Layer - deterministic scheduling
//!
//! Contains:
//! - BaselineScheduler - SM-2 ease update with checkpoint-quantized intervals
//! - Spelling classification - edit-distance grading of typed answers

pub mod scheduler;
pub mod spelling;

pub use scheduler::{ease_floor, next_ease, BaselineScheduler, MAX_EASE, MIN_EASE, SPELLING_MIN_EASE};
pub use spelling::{classify_spelling, edit_distance};
