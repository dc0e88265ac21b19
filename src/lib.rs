//! Personalized spaced-repetition scheduling.
//!
//! A deterministic SM-2 baseline quantized onto memory-decay checkpoints,
//! overlaid with a per-user FTRL-Proximal model of forgetting that is blended
//! in gradually as the user's review history grows.

pub mod baseline;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod ml;
pub mod review;
pub mod session;
pub mod store;
pub mod types;

pub use baseline::{classify_spelling, BaselineScheduler};
pub use clock::{DueLabel, StudyClock};
pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError, StoreError};
pub use ml::{
    AdaptiveEaseFactor, AdaptiveResponseThreshold, ColdStartManager, FeatureVector, IntervalOptimizer,
    MlEnhancedScheduler, ModelState, OnlineTrainer, PersonalRetentionPredictor, PopulationPrior, ReviewContext,
};
pub use review::{ReviewCoordinator, ReviewOutcome};
pub use session::{ImmediateRetryQueuePlanner, RandomSource, RetryPolicy, RetryQueue, SeededRandom};
pub use types::*;
