use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Exponential moving average estimate of how long a task takes to execute.
///
/// Every measurement folds into the running value as
/// `alpha * measurement + (1 - alpha) * old`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TimeEstimate {
    alpha: f64,
    value: f64,
}

impl TimeEstimate {
    /// Create an estimate with smoothing factor `alpha` starting at zero
    pub fn new(alpha: f64) -> Self {
        Self::with_initial(alpha, 0.0)
    }

    /// Create an estimate seeded with an initial value
    pub fn with_initial(alpha: f64, initial: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: initial.max(0.0),
        }
    }

    /// Fold a new measurement into the estimate and return the updated value
    pub fn update(&mut self, measurement: f64) -> f64 {
        self.value = self.alpha * measurement + (1.0 - self.alpha) * self.value;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl PartialOrd for TimeEstimate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}
