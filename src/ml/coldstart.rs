use tracing::debug;

use crate::config::ColdStartConfig;
use crate::error::Result;

use super::features::FeatureVector;
use super::ftrl::PersonalRetentionPredictor;
use super::prior::PopulationPrior;

/// Hands predictions over from the population prior to the personal model as
/// personal samples accumulate.
#[derive(Debug, Clone)]
pub struct ColdStartManager {
    config: ColdStartConfig,
    prior: PopulationPrior,
}

impl ColdStartManager {
    pub fn new(config: ColdStartConfig, prior: PopulationPrior) -> Self {
        Self { config, prior }
    }

    pub fn prior(&self) -> &PopulationPrior {
        &self.prior
    }

    /// Piecewise ramp: 0 → low_confidence below the low threshold,
    /// low → high_confidence up to the high threshold, then an exponential
    /// approach to 1.0.
    pub fn confidence(&self, sample_count: u64) -> f64 {
        let c = &self.config;
        let n = sample_count as f64;
        let low = c.low_sample_threshold as f64;
        let high = c.high_sample_threshold as f64;

        let value = if sample_count < c.low_sample_threshold {
            c.low_confidence * n / low
        } else if sample_count < c.high_sample_threshold {
            c.low_confidence + (c.high_confidence - c.low_confidence) * (n - low) / (high - low)
        } else {
            let excess = n - high;
            c.high_confidence + (1.0 - c.high_confidence) * (1.0 - (-excess / c.saturation_samples).exp())
        };
        value.clamp(0.0, 1.0)
    }

    /// Share of the blended prediction taken from the personal model.
    pub fn personal_weight(&self, sample_count: u64) -> f64 {
        let c = &self.config;
        if sample_count < c.low_sample_threshold {
            return 0.0;
        }
        if sample_count >= c.high_sample_threshold {
            return 1.0;
        }
        let span = (c.high_sample_threshold - c.low_sample_threshold) as f64;
        (sample_count - c.low_sample_threshold) as f64 / span
    }

    pub fn blended_predict(
        &self,
        predictor: &PersonalRetentionPredictor,
        features: &FeatureVector,
        sample_count: u64,
    ) -> Result<f64> {
        let weight = self.personal_weight(sample_count);
        let prior = self.prior.predict(features);
        if weight <= 0.0 {
            return Ok(prior);
        }
        let personal = predictor.predict(features)?;
        Ok(weight * personal + (1.0 - weight) * prior)
    }

    /// Seeds an untrained predictor from the prior. Trained predictors are
    /// left untouched. Returns whether seeding happened.
    pub fn initialize_predictor(&self, predictor: &mut PersonalRetentionPredictor) -> Result<bool> {
        if predictor.sample_count() > 0 {
            return Ok(false);
        }
        predictor.init_from_prior(self.prior.weights())?;
        debug!("personal predictor seeded from population prior");
        Ok(true)
    }
}

impl Default for ColdStartManager {
    fn default() -> Self {
        Self::new(ColdStartConfig::default(), PopulationPrior::default())
    }
}
