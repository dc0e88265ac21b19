//! Session Layer - in-session reinforcement
//!
//! Contains:
//! - ImmediateRetryQueuePlanner - where a failed item reappears in the session
//! - RetryQueue - session-local queue of failed items (never persisted)
//! - RandomSource - injected randomness for placement

pub mod retry_queue;

pub use retry_queue::{ImmediateRetryQueuePlanner, RandomSource, RetryPolicy, RetryQueue, SeededRandom};
