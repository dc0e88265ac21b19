use std::collections::HashMap;

use parking_lot::RwLock;

use crate::ml::ModelState;
use crate::types::{ItemProgress, TrainingSample};

use super::{ItemStateStore, ModelStateStore, StoreResult, TrainingSampleStore};

#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<(String, String), ItemProgress>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl ItemStateStore for MemoryItemStore {
    fn get(&self, user_id: &str, item_id: &str) -> StoreResult<Option<ItemProgress>> {
        let key = (user_id.to_string(), item_id.to_string());
        Ok(self.items.read().get(&key).cloned())
    }

    fn put(&self, user_id: &str, progress: &ItemProgress) -> StoreResult<()> {
        let key = (user_id.to_string(), progress.item_id.clone());
        self.items.write().insert(key, progress.clone());
        Ok(())
    }

    fn due_before(&self, user_id: &str, before_ts: i64) -> StoreResult<Vec<ItemProgress>> {
        let mut due: Vec<ItemProgress> = self
            .items
            .read()
            .iter()
            .filter(|((uid, _), p)| uid == user_id && p.next_review_time < before_ts)
            .map(|(_, p)| p.clone())
            .collect();
        due.sort_by(|a, b| {
            a.next_review_time
                .cmp(&b.next_review_time)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        Ok(due)
    }
}

#[derive(Debug, Default)]
pub struct MemoryModelStore {
    models: RwLock<HashMap<String, ModelState>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<ModelState> {
        self.models.read().get(user_id).cloned()
    }
}

impl ModelStateStore for MemoryModelStore {
    fn load_or_default(&self, user_id: &str) -> StoreResult<ModelState> {
        Ok(self.get(user_id).unwrap_or_default())
    }

    fn upsert(&self, user_id: &str, state: &ModelState) -> StoreResult<()> {
        self.models.write().insert(user_id.to_string(), state.clone());
        Ok(())
    }

    fn update_sample_count(&self, user_id: &str, sample_count: u64) -> StoreResult<()> {
        let mut models = self.models.write();
        models.entry(user_id.to_string()).or_default().sample_count = sample_count;
        Ok(())
    }

    fn update_response_stats(&self, user_id: &str, avg_ms: f64, std_ms: f64, count: u64) -> StoreResult<()> {
        let mut models = self.models.write();
        let model = models.entry(user_id.to_string()).or_default();
        model.avg_response_time = avg_ms;
        model.std_response_time = std_ms;
        model.response_time_count = count;
        Ok(())
    }

    fn update_learning_metrics(&self, user_id: &str, accuracy: f64, retention: f64) -> StoreResult<()> {
        let mut models = self.models.write();
        let model = models.entry(user_id.to_string()).or_default();
        model.global_accuracy = accuracy;
        model.user_base_retention = retention;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySampleStore {
    samples: RwLock<HashMap<String, Vec<TrainingSample>>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrainingSampleStore for MemorySampleStore {
    fn append(&self, user_id: &str, sample: TrainingSample) -> StoreResult<()> {
        let mut samples = self.samples.write();
        let log = samples.entry(user_id.to_string()).or_default();
        let pos = log.partition_point(|s| s.timestamp <= sample.timestamp);
        log.insert(pos, sample);
        Ok(())
    }

    fn recent(&self, user_id: &str, limit: usize) -> StoreResult<Vec<TrainingSample>> {
        let samples = self.samples.read();
        let Some(log) = samples.get(user_id) else {
            return Ok(Vec::new());
        };
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }

    fn batch(&self, user_id: &str, offset: usize, limit: usize) -> StoreResult<Vec<TrainingSample>> {
        let samples = self.samples.read();
        Ok(samples
            .get(user_id)
            .map(|log| log.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn count(&self, user_id: &str) -> StoreResult<u64> {
        Ok(self.samples.read().get(user_id).map_or(0, |log| log.len() as u64))
    }

    fn retain_newest(&self, user_id: &str, keep: usize) -> StoreResult<usize> {
        let mut samples = self.samples.write();
        let Some(log) = samples.get_mut(user_id) else {
            return Ok(0);
        };
        let excess = log.len().saturating_sub(keep);
        log.drain(..excess);
        Ok(excess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(item: &str, ts: i64) -> TrainingSample {
        TrainingSample {
            item_id: item.to_string(),
            feature_vector_json: "[]".to_string(),
            outcome_label: 0,
            timestamp: ts,
            prediction_error: 0.1,
        }
    }

    #[test]
    fn test_item_store_due_before() {
        let store = MemoryItemStore::new();
        for (id, next) in [("a", 300), ("b", 100), ("c", 900)] {
            let mut p = ItemProgress::new(id);
            p.next_review_time = next;
            store.put("u1", &p).unwrap();
        }
        let mut other = ItemProgress::new("z");
        other.next_review_time = 1;
        store.put("u2", &other).unwrap();

        let due = store.due_before("u1", 500).unwrap();
        let ids: Vec<&str> = due.iter().map(|p| p.item_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(store.get("u1", "c").unwrap().is_some());
        assert!(store.get("u1", "z").unwrap().is_none());
    }

    #[test]
    fn test_model_store_targeted_updates() {
        let store = MemoryModelStore::new();
        assert_eq!(store.load_or_default("u").unwrap(), ModelState::default());
        store.update_sample_count("u", 42).unwrap();
        store.update_response_stats("u", 3000.0, 500.0, 7).unwrap();
        store.update_learning_metrics("u", 0.7, 0.9).unwrap();
        let model = store.load_or_default("u").unwrap();
        assert_eq!(model.sample_count, 42);
        assert_eq!(model.avg_response_time, 3000.0);
        assert_eq!(model.response_time_count, 7);
        assert_eq!(model.user_base_retention, 0.9);
    }

    #[test]
    fn test_sample_store_ordering_and_trim() {
        let store = MemorySampleStore::new();
        for ts in [5, 1, 3, 4, 2] {
            store.append("u", sample("w", ts)).unwrap();
        }
        let recent: Vec<i64> = store.recent("u", 2).unwrap().iter().map(|s| s.timestamp).collect();
        assert_eq!(recent, vec![4, 5]);
        let page: Vec<i64> = store.batch("u", 1, 2).unwrap().iter().map(|s| s.timestamp).collect();
        assert_eq!(page, vec![2, 3]);

        assert_eq!(store.retain_newest("u", 3).unwrap(), 2);
        assert_eq!(store.count("u").unwrap(), 3);
        let left: Vec<i64> = store.recent("u", 10).unwrap().iter().map(|s| s.timestamp).collect();
        assert_eq!(left, vec![3, 4, 5]);
        assert_eq!(store.retain_newest("missing", 3).unwrap(), 0);
    }
}
