//! Persistence collaborators.
//!
//! The scheduler treats storage as an external row store reached through
//! these traits. Calls are blocking from the scheduler's point of view; hosts
//! with async storage bridge at their own boundary.

pub mod memory;

use crate::error::StoreError;
use crate::ml::ModelState;
use crate::types::{ItemProgress, TrainingSample};

pub use memory::{MemoryItemStore, MemoryModelStore, MemorySampleStore};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait ItemStateStore: Send + Sync {
    fn get(&self, user_id: &str, item_id: &str) -> StoreResult<Option<ItemProgress>>;

    fn put(&self, user_id: &str, progress: &ItemProgress) -> StoreResult<()>;

    /// Items whose next review time is strictly before `before_ts`, earliest first.
    fn due_before(&self, user_id: &str, before_ts: i64) -> StoreResult<Vec<ItemProgress>>;
}

pub trait ModelStateStore: Send + Sync {
    /// Returns the stored record, or a fresh default one.
    fn load_or_default(&self, user_id: &str) -> StoreResult<ModelState>;

    fn upsert(&self, user_id: &str, state: &ModelState) -> StoreResult<()>;

    fn update_sample_count(&self, user_id: &str, sample_count: u64) -> StoreResult<()>;

    /// `count` is the number of response times behind the mean and stddev.
    fn update_response_stats(&self, user_id: &str, avg_ms: f64, std_ms: f64, count: u64) -> StoreResult<()>;

    fn update_learning_metrics(&self, user_id: &str, accuracy: f64, retention: f64) -> StoreResult<()>;
}

/// Append-only training log, ordered by timestamp.
pub trait TrainingSampleStore: Send + Sync {
    fn append(&self, user_id: &str, sample: TrainingSample) -> StoreResult<()>;

    /// The newest `limit` samples in chronological order.
    fn recent(&self, user_id: &str, limit: usize) -> StoreResult<Vec<TrainingSample>>;

    /// Chronological page starting `offset` samples after the oldest.
    fn batch(&self, user_id: &str, offset: usize, limit: usize) -> StoreResult<Vec<TrainingSample>>;

    fn count(&self, user_id: &str) -> StoreResult<u64>;

    /// Deletes everything but the newest `keep` samples; returns how many went.
    fn retain_newest(&self, user_id: &str, keep: usize) -> StoreResult<usize>;
}
