//! Per-operation configuration.
//!
//! Each pipeline operation takes exactly one config struct. Values come from
//! built-in defaults, optionally a TOML file (`[filter]`, `[fit]`, `[reject]`),
//! then CLI overrides, and are validated once at the operation entry point.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Hourly observations in one year.
pub const HOURS_PER_YEAR: u32 = 8760;
/// `min_samples = total_points / MIN_SAMPLES_DIVISOR`.
pub const MIN_SAMPLES_DIVISOR: u32 = 1000;
/// `threshold = total_points / THRESHOLD_DIVISOR`.
pub const THRESHOLD_DIVISOR: u32 = 100;
pub const DEFAULT_ORDER: usize = 4;
/// Curve samples stored per fit row.
pub const DEFAULT_FIT_POINTS: usize = 5;
/// Curve samples used when estimating the minimum heat rate.
pub const DEFAULT_HR_MIN_POINTS: usize = 100;
pub const DEFAULT_STDEV_MULTIPLIER: f64 = 2.0;
/// Upper minimum-heat-rate cutoff for combined-cycle units.
pub const DEFAULT_CC_CUTOFF: f64 = 9.0;
pub const DEFAULT_MIN_UNITS: usize = 100;
/// Lowest heat rate practically achievable by a combustion unit.
pub const HEAT_RATE_FLOOR: f64 = 4.5;

/// Regime filtering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Years of hourly data in the store.
    pub years: u32,
    pub hours_per_year: u32,
    pub min_samples_divisor: u32,
    pub threshold_divisor: u32,
    /// Group types to filter; `None` filters every group in the source.
    pub group_types: Option<Vec<String>>,
    /// Restrict filtering to these unit ids.
    pub units: Option<Vec<String>>,
    /// Run unit jobs on the worker pool (otherwise sequentially).
    pub parallel: bool,
    /// Worker pool size; `None` uses one worker per logical CPU.
    pub workers: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            years: 1,
            hours_per_year: HOURS_PER_YEAR,
            min_samples_divisor: MIN_SAMPLES_DIVISOR,
            threshold_divisor: THRESHOLD_DIVISOR,
            group_types: None,
            units: None,
            parallel: true,
            workers: None,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.years == 0 {
            errors.push("filter.years must be > 0".to_string());
        }
        if self.hours_per_year == 0 {
            errors.push("filter.hours_per_year must be > 0".to_string());
        }
        if self.min_samples_divisor == 0 || self.threshold_divisor == 0 {
            errors.push("filter divisors must be > 0".to_string());
        }
        if self.workers == Some(0) {
            errors.push("filter.workers must be > 0 when set".to_string());
        }
        if let Some(groups) = &self.group_types {
            if groups.iter().any(|g| g.trim().is_empty()) {
                errors.push("filter.group_types must not contain empty names".to_string());
            }
        }
        join_errors(errors)
    }
}

/// Curve fitting options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Polynomial degree.
    pub order: usize,
    /// Load / heat-rate samples stored per fit row.
    pub points: usize,
    /// Output file extension (`csv` or `json`).
    pub extension: String,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            points: DEFAULT_FIT_POINTS,
            extension: "csv".to_string(),
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.order == 0 {
            errors.push("fit.order must be >= 1".to_string());
        }
        if self.points < 2 {
            errors.push("fit.points must be >= 2".to_string());
        }
        if let Err(e) = crate::io::FitFormat::from_extension(&self.extension) {
            errors.push(e.to_string());
        }
        join_errors(errors)
    }
}

/// Population outlier rejection options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectConfig {
    pub stdev_multiplier: f64,
    /// Upper cutoff replacing the statistical upper edge for CC groups.
    pub cc_cutoff: f64,
    /// Groups with fewer fitted units are passed through unchanged.
    pub min_units: usize,
    /// Hard lower edge for non-CC groups.
    pub lower_threshold: Option<f64>,
    /// Hard upper edge for non-CC groups.
    pub upper_threshold: Option<f64>,
    /// Samples used to locate the curve minimum.
    pub hr_min_points: usize,
    /// Minima below this value are treated as fitting artifacts.
    pub hr_floor: f64,
    /// Output file extension when writing to a separate destination.
    pub extension: String,
}

impl Default for RejectConfig {
    fn default() -> Self {
        Self {
            stdev_multiplier: DEFAULT_STDEV_MULTIPLIER,
            cc_cutoff: DEFAULT_CC_CUTOFF,
            min_units: DEFAULT_MIN_UNITS,
            lower_threshold: None,
            upper_threshold: None,
            hr_min_points: DEFAULT_HR_MIN_POINTS,
            hr_floor: HEAT_RATE_FLOOR,
            extension: "csv".to_string(),
        }
    }
}

impl RejectConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if !(self.stdev_multiplier.is_finite() && self.stdev_multiplier > 0.0) {
            errors.push("reject.stdev_multiplier must be finite and > 0".to_string());
        }
        if !self.cc_cutoff.is_finite() {
            errors.push("reject.cc_cutoff must be finite".to_string());
        }
        if self.hr_min_points < 2 {
            errors.push("reject.hr_min_points must be >= 2".to_string());
        }
        if !self.hr_floor.is_finite() {
            errors.push("reject.hr_floor must be finite".to_string());
        }
        for (name, value) in [("lower_threshold", self.lower_threshold), ("upper_threshold", self.upper_threshold)] {
            if value.is_some_and(|v| !v.is_finite()) {
                errors.push(format!("reject.{name} must be finite"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.lower_threshold, self.upper_threshold) {
            if lo >= hi {
                errors.push(format!("reject.lower_threshold ({lo}) must be < upper_threshold ({hi})"));
            }
        }
        if let Err(e) = crate::io::FitFormat::from_extension(&self.extension) {
            errors.push(e.to_string());
        }
        join_errors(errors)
    }
}

/// Every operation's options, as read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub filter: FilterConfig,
    pub fit: FitConfig,
    pub reject: RejectConfig,
}

impl PipelineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(path).map_err(|e| AppError::io("read config", path, e))?;
        toml::from_str(&contents)
            .map_err(|e| AppError::config(format!("Invalid config '{}': {e}", path.display())))
    }
}

fn join_errors(errors: Vec<String>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::config(errors.join("; ")))
    }
}
