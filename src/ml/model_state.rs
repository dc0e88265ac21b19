use serde::{Deserialize, Serialize};

use super::features::FEATURE_DIM;

/// Per-user model record as it crosses the storage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelState {
    pub n: Vec<f64>,
    pub z: Vec<f64>,
    pub weights: Vec<f64>,
    pub version: u64,
    pub sample_count: u64,
    pub last_training_time: i64,
    #[serde(default)]
    pub last_replay_time: i64,
    pub avg_response_time: f64,
    pub std_response_time: f64,
    /// Response times folded into the two fields above.
    #[serde(default)]
    pub response_time_count: u64,
    pub global_accuracy: f64,
    pub user_base_retention: f64,
}

impl Default for ModelState {
    fn default() -> Self {
        Self::with_dimension(FEATURE_DIM)
    }
}

impl ModelState {
    pub fn with_dimension(dim: usize) -> Self {
        Self {
            n: vec![0.0; dim],
            z: vec![0.0; dim],
            weights: vec![0.0; dim],
            version: 0,
            sample_count: 0,
            last_training_time: 0,
            last_replay_time: 0,
            avg_response_time: 0.0,
            std_response_time: 0.0,
            response_time_count: 0,
            global_accuracy: 0.5,
            user_base_retention: 0.85,
        }
    }

    pub fn dimension(&self) -> usize {
        self.weights.len()
    }

    /// Folds one response time into the running mean and population stddev
    /// (Welford). Non-finite or negative values are ignored.
    pub fn record_response_time(&mut self, response_time_ms: f64) {
        if !response_time_ms.is_finite() || response_time_ms < 0.0 {
            return;
        }
        let count = self.response_time_count;
        self.response_time_count += 1;
        if count == 0 {
            self.avg_response_time = response_time_ms;
            self.std_response_time = 0.0;
            return;
        }
        let n = count as f64;
        let old_mean = self.avg_response_time;
        let old_m2 = self.std_response_time.powi(2) * n;
        let mean = old_mean + (response_time_ms - old_mean) / (n + 1.0);
        let m2 = old_m2 + (response_time_ms - old_mean) * (response_time_ms - mean);
        self.avg_response_time = mean;
        self.std_response_time = (m2 / (n + 1.0)).max(0.0).sqrt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dimension() {
        let state = ModelState::default();
        assert_eq!(state.dimension(), FEATURE_DIM);
        assert_eq!(state.n.len(), FEATURE_DIM);
        assert_eq!(state.z.len(), FEATURE_DIM);
    }

    #[test]
    fn test_response_time_statistics() {
        let mut state = ModelState::default();
        for rt in [2000.0, 4000.0, 6000.0] {
            state.record_response_time(rt);
        }
        assert_eq!(state.response_time_count, 3);
        assert!((state.avg_response_time - 4000.0).abs() < 1e-6);
        // population stddev of {2000, 4000, 6000}
        assert!((state.std_response_time - 1632.993).abs() < 0.01);
    }

    #[test]
    fn test_invalid_response_time_not_counted() {
        let mut state = ModelState::default();
        state.record_response_time(f64::NAN);
        state.record_response_time(-5.0);
        state.record_response_time(4000.0);
        assert_eq!(state.response_time_count, 1);
        assert_eq!(state.avg_response_time, 4000.0);
        assert_eq!(state.std_response_time, 0.0);
    }

    #[test]
    fn test_older_records_default_response_count() {
        let mut json = serde_json::to_value(ModelState::default()).unwrap();
        json.as_object_mut().unwrap().remove("responseTimeCount");
        let state: ModelState = serde_json::from_value(json).unwrap();
        assert_eq!(state.response_time_count, 0);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(ModelState::default()).unwrap();
        assert!(json.get("sampleCount").is_some());
        assert!(json.get("userBaseRetention").is_some());
    }
}
