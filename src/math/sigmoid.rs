use serde::{Deserialize, Serialize};

/// Parameters of a logistic curve `gamma / (1 + exp(reactivity * (offset - x)))`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct SigmoidParams {
    /// Steepness of the transition
    pub reactivity: f64,
    /// Input value at which the curve reaches half of `gamma`
    pub offset: f64,
    /// Upper asymptote
    pub gamma: f64,
}

impl Default for SigmoidParams {
    fn default() -> Self {
        Self {
            reactivity: 1.5,
            offset: 1.0,
            gamma: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sigmoid {
    params: SigmoidParams,
}

impl Sigmoid {
    pub fn new(params: SigmoidParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SigmoidParams {
        &self.params
    }

    /// Evaluate the curve at `x`.
    ///
    /// The exponent is clamped so the result stays finite for any finite input.
    pub fn eval(&self, x: f64) -> f64 {
        let theta = (self.params.reactivity * (self.params.offset - x)).clamp(-700.0, 700.0);
        self.params.gamma / (1.0 + theta.exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_gamma_at_offset() {
        let sigmoid = Sigmoid::new(SigmoidParams {
            reactivity: 4.0,
            offset: 2.0,
            gamma: 0.8,
        });
        assert!((sigmoid.eval(2.0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_extreme_inputs_stay_finite() {
        let sigmoid = Sigmoid::new(SigmoidParams {
            reactivity: 1000.0,
            offset: 0.0,
            gamma: 1.0,
        });
        assert!(sigmoid.eval(-1e9) < 1e-300);
        assert_eq!(sigmoid.eval(1e9), 1.0);
    }
}
