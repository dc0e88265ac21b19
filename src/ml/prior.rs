//! Population prior: a fixed logistic model shared by all users.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SchedulerError};

use super::features::{FeatureVector, FEATURE_DIM};
use super::ftrl::{dot, sigmoid};

/// Fallback weights, used when no prior file is configured or it fails to load.
pub const DEFAULT_PRIOR_WEIGHTS: [f64; FEATURE_DIM] = [
    1.2,  // difficulty
    0.1,  // hour of day
    0.0,  // day of week
    0.6,  // session fatigue
    -0.4, // interval
    -0.8, // ease
    -1.2, // rolling accuracy
    0.5,  // response time
    -1.0, // streak
    1.5,  // recency
    -1.5, // base retention
    0.0,  // reserved
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationPrior {
    weights: Vec<f64>,
}

impl Default for PopulationPrior {
    fn default() -> Self {
        Self {
            weights: DEFAULT_PRIOR_WEIGHTS.to_vec(),
        }
    }
}

impl PopulationPrior {
    pub fn from_weights(weights: Vec<f64>) -> Result<Self> {
        if weights.len() != FEATURE_DIM {
            return Err(SchedulerError::DimensionMismatch {
                expected: FEATURE_DIM,
                actual: weights.len(),
            });
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(SchedulerError::InvalidFeature("prior weight is not finite".to_string()));
        }
        Ok(Self { weights })
    }

    /// Reads a `[w1,w2,...]` JSON array.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::error::StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        let weights: Vec<f64> = serde_json::from_str(&text)?;
        Self::from_weights(weights)
    }

    /// Loads the prior from `path`, falling back to the built-in weights.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::from_file(path) {
            Ok(prior) => {
                info!(path = %path.display(), "population prior loaded");
                prior
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "population prior unavailable, using built-in weights");
                Self::default()
            }
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        sigmoid(dot(&self.weights, features.as_slice()))
    }
}
