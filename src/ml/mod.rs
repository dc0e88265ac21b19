//! ML Layer - personal retention model and schedule overlay
//!
//! Contains:
//! - FeatureExtractor / FeatureVector - 12-dimensional review features
//! - PersonalRetentionPredictor - FTRL-Proximal forgetting model
//! - PopulationPrior / ColdStartManager - prior weights and confidence ramp
//! - AdaptiveEaseFactor / AdaptiveResponseThreshold - per-user primitives
//! - IntervalOptimizer - bounded interval scaling toward target retention
//! - MlEnhancedScheduler - overlay on the baseline schedule
//! - OnlineTrainer - per-review training, mini-batches and daily replay

pub mod adaptive;
pub mod coldstart;
pub mod enhanced;
pub mod features;
pub mod ftrl;
pub mod model_state;
pub mod optimizer;
pub mod prior;
pub mod trainer;

pub use adaptive::{AdaptiveEaseFactor, AdaptiveResponseThreshold};
pub use coldstart::ColdStartManager;
pub use enhanced::{MlEnhancedScheduler, ReviewContext};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_DIM};
pub use ftrl::{sigmoid, PersonalRetentionPredictor};
pub use model_state::ModelState;
pub use optimizer::IntervalOptimizer;
pub use prior::{PopulationPrior, DEFAULT_PRIOR_WEIGHTS};
pub use trainer::{compute_metrics, LearningMetrics, OnlineTrainer, TrainingReport};
