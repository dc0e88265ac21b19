//! FTRL-Proximal logistic model predicting the probability of forgetting.
//!
//! Per-coordinate state is the accumulated squared gradient `n` and the
//! adjusted gradient sum `z`. Weights are never learned directly; they are
//! recovered from `(n, z)` in closed form:
//!
//! ```text
//! w_i = 0                                            if |z_i| <= λ1
//! w_i = -(z_i - sign(z_i)·λ1) / ((β + √n_i)/α + λ2)  otherwise
//! ```

use tracing::debug;

use crate::config::FtrlParams;
use crate::error::{Result, SchedulerError};
use crate::types::LABEL_FORGOTTEN;

use super::features::{FeatureVector, FEATURE_DIM};
use super::model_state::ModelState;

const SIGMOID_CLAMP: f64 = 35.0;

pub fn sigmoid(x: f64) -> f64 {
    let x = x.clamp(-SIGMOID_CLAMP, SIGMOID_CLAMP);
    1.0 / (1.0 + (-x).exp())
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Clone)]
pub struct PersonalRetentionPredictor {
    params: FtrlParams,
    state: ModelState,
}

impl PersonalRetentionPredictor {
    pub fn new(params: FtrlParams) -> Self {
        Self {
            params,
            state: ModelState::default(),
        }
    }

    pub fn from_state(params: FtrlParams, state: ModelState) -> Result<Self> {
        let mut predictor = Self::new(params);
        predictor.restore(state)?;
        Ok(predictor)
    }

    pub fn params(&self) -> &FtrlParams {
        &self.params
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn snapshot(&self) -> ModelState {
        self.state.clone()
    }

    pub fn sample_count(&self) -> u64 {
        self.state.sample_count
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn weights(&self) -> Vec<f64> {
        (0..FEATURE_DIM).map(|i| self.weight(i)).collect()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        self.check_dimension(features)?;
        let logit: f64 = features
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, x)| self.weight(i) * x)
            .sum();
        Ok(sigmoid(logit))
    }

    /// One online step on a fresh review. Returns the absolute prediction error.
    pub fn update(&mut self, features: &FeatureVector, label: u8) -> Result<f64> {
        let error = self.step(features, label)?;
        self.state.sample_count += 1;
        Ok(error)
    }

    /// Replays an already counted sample; moves the weights without
    /// incrementing `sample_count`.
    pub fn reinforce(&mut self, features: &FeatureVector, label: u8) -> Result<f64> {
        self.step(features, label)
    }

    /// Seeds `z` so the closed-form weights equal `prior` while `n` is zero.
    pub fn init_from_prior(&mut self, prior: &[f64]) -> Result<()> {
        if self.state.sample_count > 0 {
            return Err(SchedulerError::AlreadyTrained {
                sample_count: self.state.sample_count,
            });
        }
        if prior.len() != FEATURE_DIM {
            return Err(SchedulerError::DimensionMismatch {
                expected: FEATURE_DIM,
                actual: prior.len(),
            });
        }

        let denom = self.params.beta / self.params.alpha + self.params.l2;
        for (i, w) in prior.iter().enumerate() {
            self.state.n[i] = 0.0;
            self.state.z[i] = if *w > 0.0 {
                -w * denom - self.params.l1
            } else if *w < 0.0 {
                -w * denom + self.params.l1
            } else {
                0.0
            };
        }
        self.refresh_weights();
        self.state.version += 1;
        Ok(())
    }

    /// Replaces the whole model state; all three arrays must match the
    /// feature dimension or nothing is loaded.
    pub fn restore(&mut self, state: ModelState) -> Result<()> {
        for len in [state.n.len(), state.z.len(), state.weights.len()] {
            if len != FEATURE_DIM {
                return Err(SchedulerError::DimensionMismatch {
                    expected: FEATURE_DIM,
                    actual: len,
                });
            }
        }
        if state.n.iter().chain(&state.z).any(|v| !v.is_finite()) || state.n.iter().any(|v| *v < 0.0) {
            return Err(SchedulerError::InvalidFeature("restored model arrays are corrupt".to_string()));
        }
        self.state = state;
        self.refresh_weights();
        Ok(())
    }

    pub fn set_learning_metrics(&mut self, accuracy: f64, retention: f64) {
        self.state.global_accuracy = accuracy.clamp(0.0, 1.0);
        self.state.user_base_retention = retention.clamp(0.0, 1.0);
    }

    pub fn record_response_time(&mut self, response_time_ms: f64) {
        self.state.record_response_time(response_time_ms);
    }

    pub fn mark_trained(&mut self, now: i64) {
        self.state.last_training_time = now;
    }

    pub fn mark_replayed(&mut self, now: i64) {
        self.state.last_replay_time = now;
    }

    fn step(&mut self, features: &FeatureVector, label: u8) -> Result<f64> {
        self.check_dimension(features)?;
        if label > LABEL_FORGOTTEN {
            return Err(SchedulerError::InvalidLabel(label));
        }

        self.refresh_weights();
        let x = features.as_slice();
        let prediction = sigmoid(dot(&self.state.weights, x));
        let error = prediction - label as f64;

        for (i, xi) in x.iter().enumerate() {
            let g = error * xi;
            let n = self.state.n[i];
            let sigma = ((n + g * g).sqrt() - n.sqrt()) / self.params.alpha;
            self.state.z[i] += g - sigma * self.state.weights[i];
            self.state.n[i] = n + g * g;
        }

        self.refresh_weights();
        self.state.version += 1;

        debug!(prediction, label, version = self.state.version, "ftrl step applied");
        Ok(error.abs())
    }

    fn weight(&self, i: usize) -> f64 {
        let z = self.state.z[i];
        if z.abs() <= self.params.l1 {
            return 0.0;
        }
        let sign = z.signum();
        -(z - sign * self.params.l1) / ((self.params.beta + self.state.n[i].sqrt()) / self.params.alpha + self.params.l2)
    }

    fn refresh_weights(&mut self) {
        for i in 0..FEATURE_DIM {
            self.state.weights[i] = self.weight(i);
        }
    }

    fn check_dimension(&self, features: &FeatureVector) -> Result<()> {
        if features.len() != FEATURE_DIM {
            return Err(SchedulerError::DimensionMismatch {
                expected: FEATURE_DIM,
                actual: features.len(),
            });
        }
        Ok(())
    }
}

impl Default for PersonalRetentionPredictor {
    fn default() -> Self {
        Self::new(FtrlParams::default())
    }
}
