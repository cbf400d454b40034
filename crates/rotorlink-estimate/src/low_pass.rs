use crate::error::{EstimateError, Result};

/// First-order exponential smoothing: `y += alpha * (x - y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LowPassFilter {
    alpha: f64,
    value: Option<f64>,
}

impl LowPassFilter {
    /// `alpha` is the weight of each new sample, in (0, 1].
    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(EstimateError::InvalidSmoothing { alpha });
        }
        Ok(Self { alpha, value: None })
    }

    /// For factors already known to lie in (0, 1].
    pub(crate) const fn with_alpha(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    /// Feed a sample and return the filtered value. The first sample passes
    /// through unchanged.
    pub fn apply(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(prev) => prev + self.alpha * (sample - prev),
            None => sample,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}
