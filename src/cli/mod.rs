//! Command-line parsing for the heat-rate curve pipeline.
//!
//! Flags only override values; defaults live in the per-operation config
//! structs so a TOML file and the CLI agree on them.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{FilterConfig, FitConfig, RejectConfig};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "hrc", version, about = "Heat-rate curves from hourly emissions data")]
pub struct Cli {
    /// TOML file with `[filter]`, `[fit]` and `[reject]` tables.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Label operating regimes of every unit, group by group.
    Filter(FilterArgs),
    /// Fit heat-rate curves to labeled time series.
    Fit(FitArgs),
    /// Invalidate population outliers in fit tables.
    Reject(RejectArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FilterArgs {
    /// Directory of `<group>.csv` time series.
    #[arg(long)]
    pub source: PathBuf,

    /// Directory receiving labeled time series.
    #[arg(long)]
    pub dest: PathBuf,

    /// Group type to filter (repeatable); all groups when omitted.
    #[arg(long = "group")]
    pub groups: Vec<String>,

    /// Restrict filtering to these unit ids (repeatable).
    #[arg(long = "unit")]
    pub units: Vec<String>,

    /// Years of hourly data in the source.
    #[arg(long)]
    pub years: Option<u32>,

    /// Label units one at a time on the main thread.
    #[arg(long)]
    pub sequential: bool,

    /// Worker pool size.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Source loads are gross generation.
    #[arg(long)]
    pub gross_load: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Directory of labeled `<group>.csv` time series.
    #[arg(long)]
    pub source: PathBuf,

    /// Directory receiving `<group>_fits.<ext>` tables.
    #[arg(long)]
    pub out: PathBuf,

    /// Polynomial order.
    #[arg(long)]
    pub order: Option<usize>,

    /// Curve samples stored per row.
    #[arg(long)]
    pub points: Option<usize>,

    /// Output format (csv or json).
    #[arg(long)]
    pub ext: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RejectArgs {
    /// Directory of `<group>_fits.<ext>` tables.
    #[arg(long)]
    pub fits: PathBuf,

    /// Write results here instead of in place.
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Output format (csv or json).
    #[arg(long)]
    pub ext: Option<String>,

    /// Band half-width in standard deviations.
    #[arg(long)]
    pub stdev: Option<f64>,

    /// Upper minimum heat rate for combined-cycle units.
    #[arg(long)]
    pub cc_cutoff: Option<f64>,

    /// Smallest population to test.
    #[arg(long)]
    pub min_units: Option<usize>,

    /// Hard lower edge of the band.
    #[arg(long)]
    pub lower: Option<f64>,

    /// Hard upper edge of the band.
    #[arg(long)]
    pub upper: Option<f64>,
}

impl FilterArgs {
    pub fn apply(&self, config: &mut FilterConfig) {
        if !self.groups.is_empty() {
            config.group_types = Some(self.groups.clone());
        }
        if !self.units.is_empty() {
            config.units = Some(self.units.clone());
        }
        if let Some(years) = self.years {
            config.years = years;
        }
        if self.sequential {
            config.parallel = false;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
    }
}

impl FitArgs {
    pub fn apply(&self, config: &mut FitConfig) {
        if let Some(order) = self.order {
            config.order = order;
        }
        if let Some(points) = self.points {
            config.points = points;
        }
        if let Some(ext) = &self.ext {
            config.extension = ext.clone();
        }
    }
}

impl RejectArgs {
    pub fn apply(&self, config: &mut RejectConfig) {
        if let Some(k) = self.stdev {
            config.stdev_multiplier = k;
        }
        if let Some(cutoff) = self.cc_cutoff {
            config.cc_cutoff = cutoff;
        }
        if let Some(n) = self.min_units {
            config.min_units = n;
        }
        if self.lower.is_some() {
            config.lower_threshold = self.lower;
        }
        if self.upper.is_some() {
            config.upper_threshold = self.upper;
        }
        if let Some(ext) = &self.ext {
            config.extension = ext.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_only_what_they_name() {
        let cli = Cli::parse_from([
            "hrc", "reject", "--fits", "fits", "--stdev", "3", "--upper", "14.5", "--log-json",
        ]);
        assert!(cli.log_json);
        let Command::Reject(args) = cli.command else {
            panic!("expected reject");
        };

        let mut config = RejectConfig::default();
        args.apply(&mut config);
        assert_eq!(config.stdev_multiplier, 3.0);
        assert_eq!(config.upper_threshold, Some(14.5));
        assert_eq!(config.lower_threshold, None);
        assert_eq!(config.min_units, 100);
    }

    #[test]
    fn repeated_groups_collect() {
        let cli = Cli::parse_from([
            "hrc", "--config", "p.toml", "filter", "--source", "in", "--dest", "out", "--group", "CT (NG)",
            "--group", "CC (NG)", "--sequential",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("p.toml")));
        let Command::Filter(args) = cli.command else {
            panic!("expected filter");
        };

        let mut config = FilterConfig::default();
        args.apply(&mut config);
        assert_eq!(config.group_types, Some(vec!["CT (NG)".to_string(), "CC (NG)".to_string()]));
        assert!(!config.parallel);
        assert_eq!(config.units, None);
    }
}
