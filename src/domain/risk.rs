use super::account::Amount;
use crate::error::{GatewayError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Outcome of a risk evaluation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Decision {
    Approve,
    Reject,
    /// Route to the asynchronous analysis process.
    Defer,
}

/// Decides what happens to a charge of `amount`.
///
/// The orchestrator only depends on this trait, so a scoring engine can be
/// swapped in without touching it.
pub trait RiskPolicy: Send + Sync {
    fn decide(&self, amount: Amount) -> Decision;
}

pub type RiskPolicyRef = Arc<dyn RiskPolicy>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Amounts strictly above this are deferred.
    pub high_value_threshold: Decimal,
    /// Probability in [0, 1] that an inline charge is approved.
    pub approval_probability: f64,
    /// Fixed seed for the policy's generator. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: dec!(10000),
            approval_probability: 0.7,
            seed: None,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.high_value_threshold <= Decimal::ZERO {
            return Err(GatewayError::ValidationError(format!(
                "high value threshold must be positive, got {}",
                self.high_value_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.approval_probability) {
            return Err(GatewayError::ValidationError(format!(
                "approval probability must be within [0, 1], got {}",
                self.approval_probability
            )));
        }
        Ok(())
    }
}

/// Defers high-value charges and approves the rest at random with a fixed probability.
///
/// One generator per policy, seeded once and shared by every call.
pub struct ThresholdRiskPolicy {
    high_value_threshold: Decimal,
    approval_probability: f64,
    rng: Mutex<StdRng>,
}

impl ThresholdRiskPolicy {
    pub fn new(config: &RiskConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            high_value_threshold: config.high_value_threshold,
            approval_probability: config.approval_probability,
            rng: Mutex::new(rng),
        })
    }

    fn sample(&self) -> f64 {
        // A poisoned lock still guards a valid generator.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.r#gen::<f64>()
    }
}

impl RiskPolicy for ThresholdRiskPolicy {
    fn decide(&self, amount: Amount) -> Decision {
        if amount.value() > self.high_value_threshold {
            return Decision::Defer;
        }
        if self.sample() <= self.approval_probability {
            Decision::Approve
        } else {
            Decision::Reject
        }
    }
}
