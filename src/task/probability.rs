//! Probability models driving abort, partition and TAB switch decisions.
//!
//! Every model maps a ratio of execution times onto a [`Sigmoid`]. Ratios are
//! computed from inputs clamped to [`MIN_RATIO_INPUT`], so no model can divide by
//! zero or produce NaN.

use crate::math::{Sigmoid, SigmoidParams};
use serde::{Deserialize, Serialize};

/// Smallest value a time used as ratio input is clamped to
pub const MIN_RATIO_INPUT: f64 = 1e-6;

fn ratio(numerator: f64, denominator: f64) -> f64 {
    numerator.max(MIN_RATIO_INPUT) / denominator.max(MIN_RATIO_INPUT)
}

/// Parameters of the abort probability curve
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct AbortParams {
    pub reactivity: f64,
    pub offset: f64,
    pub gamma: f64,
    /// Floor applied to every computed probability
    pub min_prob: f64,
}

impl AbortParams {
    pub const DEFAULT_REACTIVITY: f64 = 8.0;
    pub const DEFAULT_OFFSET: f64 = 3.0;
    pub const DEFAULT_GAMMA: f64 = 1.0;
    pub const MIN_ABORT_PROB: f64 = 0.0001;

    fn sigmoid_params(&self) -> SigmoidParams {
        SigmoidParams {
            reactivity: self.reactivity,
            offset: self.offset,
            gamma: self.gamma,
        }
    }
}

impl Default for AbortParams {
    fn default() -> Self {
        Self {
            reactivity: Self::DEFAULT_REACTIVITY,
            offset: Self::DEFAULT_OFFSET,
            gamma: Self::DEFAULT_GAMMA,
            min_prob: Self::MIN_ABORT_PROB,
        }
    }
}

/// Probability of giving up on a running task, rising as it overruns its estimate
#[derive(Clone, Copy, Debug)]
pub struct AbortProbability {
    sigmoid: Sigmoid,
    min_prob: f64,
}

impl AbortProbability {
    pub fn new(params: AbortParams) -> Self {
        Self {
            sigmoid: Sigmoid::new(params.sigmoid_params()),
            min_prob: params.min_prob,
        }
    }

    /// Never below the configured floor, so no task becomes un-abortable
    pub fn calc(&self, exec_time: f64, estimate: f64) -> f64 {
        self.sigmoid.eval(ratio(exec_time, estimate)).max(self.min_prob)
    }

    pub fn min_prob(&self) -> f64 {
        self.min_prob
    }
}

impl Default for AbortProbability {
    fn default() -> Self {
        Self::new(AbortParams::default())
    }
}

/// Probability of executing a composite task whole instead of partitioning it.
///
/// Grows as the summed subtask estimates exceed the composite estimate.
#[derive(Clone, Copy, Debug)]
pub struct PartitionProbability {
    sigmoid: Sigmoid,
}

impl PartitionProbability {
    pub fn new(params: SigmoidParams) -> Self {
        Self {
            sigmoid: Sigmoid::new(params),
        }
    }

    pub fn calc(&self, children_estimate_sum: f64, parent_estimate: f64) -> f64 {
        self.sigmoid.eval(ratio(children_estimate_sum, parent_estimate))
    }
}

/// Probability of keeping the active TAB when moving from one TAB to another is possible
#[derive(Clone, Copy, Debug)]
pub struct TabSwitchProbability {
    sigmoid: Sigmoid,
}

impl TabSwitchProbability {
    pub fn new(params: SigmoidParams) -> Self {
        Self {
            sigmoid: Sigmoid::new(params),
        }
    }

    pub fn calc(&self, from_estimate: f64, to_estimate: f64) -> f64 {
        self.sigmoid.eval(ratio(to_estimate, from_estimate))
    }
}
