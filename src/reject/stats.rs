//! Population statistics and the acceptance band.

use serde::Serialize;
use statrs::statistics::Statistics;

/// Mean and population standard deviation of a set of minimum heat rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopulationStats {
    pub n: usize,
    pub mean: f64,
    /// Population (ddof = 0) standard deviation.
    pub stdev: f64,
}

impl PopulationStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mean = values.iter().mean();
        let stdev = if values.len() == 1 {
            0.0
        } else {
            values.iter().population_std_dev()
        };
        Some(Self {
            n: values.len(),
            mean,
            stdev,
        })
    }

    /// `[mean - k·σ, mean + k·σ]`.
    pub fn band(&self, stdev_multiplier: f64) -> Band {
        let half = stdev_multiplier * self.stdev;
        Band {
            lower: self.mean - half,
            upper: self.mean + half,
        }
    }
}

/// Closed acceptance interval; values strictly outside fail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub lower: f64,
    pub upper: f64,
}

impl Band {
    /// Replace either edge outright with a hard threshold.
    pub fn with_overrides(self, lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            lower: lower.unwrap_or(self.lower),
            upper: upper.unwrap_or(self.upper),
        }
    }

    /// Only an upper edge.
    pub fn upper_only(upper: f64) -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper,
        }
    }

    pub fn rejects(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}
