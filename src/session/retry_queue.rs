use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetryConfig;

/// Uniform integer source in the half-open range `[from, until)`.
pub trait RandomSource {
    fn next_int(&mut self, from: usize, until: usize) -> usize;
}

/// ChaCha8-backed source; seeded runs place items reproducibly.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_int(&mut self, from: usize, until: usize) -> usize {
        if from >= until {
            return from;
        }
        self.rng.gen_range(from..until)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryPolicy {
    /// Somewhere in the back half of the queue.
    HalfWay,
    /// Somewhere in the last quarter of the queue.
    NearEnd,
}

impl RetryPolicy {
    fn range_start(&self, queue_size: usize) -> usize {
        match self {
            RetryPolicy::HalfWay => queue_size / 2,
            RetryPolicy::NearEnd => queue_size - queue_size / 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImmediateRetryQueuePlanner {
    config: RetryConfig,
}

impl ImmediateRetryQueuePlanner {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Index at which a failed item is inserted into a queue of `queue_size`.
    ///
    /// Queues of up to `short_queue_max` items take it at the tail. Longer
    /// queues draw from `[policy start, queue_size)`.
    pub fn resolve_insert_index(
        &self,
        queue_size: usize,
        policy: RetryPolicy,
        random: &mut dyn RandomSource,
    ) -> usize {
        if queue_size <= self.config.short_queue_max {
            return queue_size;
        }
        let from = policy.range_start(queue_size);
        random.next_int(from, queue_size).clamp(from, queue_size)
    }
}

/// Failed items waiting to be shown again before the session ends.
#[derive(Debug, Clone, Default)]
pub struct RetryQueue {
    planner: ImmediateRetryQueuePlanner,
    items: VecDeque<String>,
}

impl RetryQueue {
    pub fn new(planner: ImmediateRetryQueuePlanner) -> Self {
        Self {
            planner,
            items: VecDeque::new(),
        }
    }

    /// Re-queues a failed item. An item already waiting is moved, not
    /// duplicated. Returns the insertion index.
    pub fn push_failed(
        &mut self,
        item_id: &str,
        policy: RetryPolicy,
        random: &mut dyn RandomSource,
    ) -> usize {
        if let Some(pos) = self.items.iter().position(|id| id == item_id) {
            self.items.remove(pos);
        }
        let index = self
            .planner
            .resolve_insert_index(self.items.len(), policy, random);
        self.items.insert(index, item_id.to_string());
        debug!(item_id = %item_id, index, queue_len = self.items.len(), "item queued for retry");
        index
    }

    pub fn pop_next(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    pub fn remove(&mut self, item_id: &str) -> bool {
        match self.items.iter().position(|id| id == item_id) {
            Some(pos) => self.items.remove(pos).is_some(),
            None => false,
        }
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.items.iter().any(|id| id == item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}
