//! Operation entry points shared by the CLI and library callers.
//!
//! Each operation walks the groups of a source store one at a time and writes
//! one output table per completed group:
//!
//! filter: time series -> labeled time series
//! fit:    labeled time series -> fit tables
//! reject: fit tables -> fit tables with outliers invalidated

use tracing::{info, warn};

use crate::domain::{FitTable, GroupType};
use crate::error::AppError;
use crate::filter::RegimeFilter;
use crate::fit::CurveFitter;
use crate::reject::{OutlierRejector, RejectionSummary};
use crate::store::{FitStore, TimeSeriesStore};

/// Label every requested group of `source` and write it to `dest`.
///
/// Groups come from `FilterConfig::group_types`, or every group in `source`
/// when unset. A failing group aborts the run; groups finished before it stay
/// written.
pub fn run_filter(
    source: &dyn TimeSeriesStore,
    dest: &mut dyn TimeSeriesStore,
    filter: &RegimeFilter,
) -> Result<Vec<GroupType>, AppError> {
    let groups = match &filter.config().group_types {
        Some(names) => names
            .iter()
            .map(|name| GroupType::parse(name))
            .collect::<Result<Vec<_>, _>>()?,
        None => source.series_groups()?,
    };

    let mut done = Vec::with_capacity(groups.len());
    for group in groups {
        let table = source.read_group(&group)?;
        let labeled = filter.filter_group(&table)?;
        dest.write_group(&labeled)?;
        info!(group = %group, units = labeled.units.len(), "filtered group written");
        done.push(group);
    }
    Ok(done)
}

/// Fit every group of `source`, writing one fit table per group to `out`.
pub fn run_fit(
    source: &dyn TimeSeriesStore,
    fitter: &CurveFitter,
    out: &mut dyn FitStore,
) -> Result<Vec<FitTable>, AppError> {
    let mut tables = Vec::new();
    for group in source.series_groups()? {
        let table = source.read_group(&group)?;
        let fits = fitter.fit_group(&table);
        out.write_fits(&fits)?;
        info!(
            group = %group,
            rows = fits.rows.len(),
            fitted = fits.fitted_count(),
            "fit table written"
        );
        tables.push(fits);
    }
    Ok(tables)
}

/// Reject outliers in every group of `source`.
///
/// Results go back into `source` unless `dest` is given. Skipped groups are
/// left untouched in place, but still copied to a separate destination.
pub fn run_reject(
    source: &mut dyn FitStore,
    mut dest: Option<&mut dyn FitStore>,
    rejector: &OutlierRejector,
) -> Result<Vec<RejectionSummary>, AppError> {
    let mut summaries = Vec::new();
    for group in source.fit_groups()? {
        let table = source.read_fits(&group)?;
        let (filtered, summary) = rejector.reject_group(&table);

        match dest.as_deref_mut() {
            Some(dest) => dest.write_fits(&filtered)?,
            None if summary.skipped => {}
            None => source.write_fits(&filtered)?,
        }

        if !summary.skipped {
            info!(group = %group, failed = summary.failed.len(), "outlier rejection applied");
        } else if dest.is_none() {
            warn!(group = %group, "group left unchanged");
        }
        summaries.push(summary);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{
        FilterConfig, FitConfig, FitStatus, GroupTable, OperatingPoint, RejectConfig, UnitMeta, UnitSeries,
    };
    use crate::filter::{ClusterStrategies, RegimeClusterer};
    use crate::math::polyval;
    use crate::store::MemoryStore;

    /// Parabola with its minimum `floor_hr` at load 120.
    fn curve(floor_hr: f64) -> [f64; 3] {
        [0.0002, -0.048, 0.0002 * 120.0 * 120.0 + floor_hr]
    }

    fn unit(id: &str, n: usize, floor_hr: f64) -> UnitSeries {
        let t0 = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let coefficients = curve(floor_hr);
        let points = (0..n)
            .map(|i| {
                let load = 50.0 + ((i * 7) % n) as f64 * (150.0 / n as f64);
                OperatingPoint::new(t0 + chrono::Duration::hours(i as i64), load, polyval(&coefficients, load))
            })
            .collect();
        UnitSeries::new(id, UnitMeta::default(), points)
    }

    fn group(name: &str, units: Vec<UnitSeries>) -> GroupTable {
        GroupTable::new(GroupType::parse(name).unwrap(), units)
    }

    fn sequential_filter() -> RegimeFilter {
        RegimeFilter::new(
            ClusterStrategies::default(),
            FilterConfig {
                parallel: false,
                ..FilterConfig::default()
            },
        )
        .unwrap()
    }

    fn fitter() -> CurveFitter {
        CurveFitter::new(FitConfig {
            order: 2,
            ..FitConfig::default()
        })
        .unwrap()
    }

    fn rejector(min_units: usize) -> OutlierRejector {
        OutlierRejector::new(RejectConfig {
            min_units,
            ..RejectConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn filter_fit_reject_end_to_end() {
        let mut units: Vec<UnitSeries> = (0..9).map(|i| unit(&format!("u{i}"), 120, 10.0)).collect();
        units.push(unit("hot", 120, 18.0));
        units.push(unit("tiny", 20, 10.0));
        let source = MemoryStore::with_series([group("CT (NG)", units)]);

        let mut filtered = MemoryStore::new();
        let written = run_filter(&source, &mut filtered, &sequential_filter()).unwrap();
        assert_eq!(written.len(), 1);

        let labeled = filtered.read_group(&written[0]).unwrap();
        assert_eq!(labeled.units.len(), 11);
        assert!(labeled.unit("tiny").unwrap().retained_labels().is_empty());

        let mut fits = MemoryStore::new();
        let tables = run_fit(&filtered, &fitter(), &mut fits).unwrap();
        assert_eq!(tables[0].rows.len(), 11);
        assert_eq!(tables[0].row("tiny").unwrap().status, FitStatus::NoFit);
        assert_eq!(tables[0].fitted_count(), 10);

        let summaries = run_reject(&mut fits, None, &rejector(5)).unwrap();
        assert_eq!(summaries[0].failed, vec!["hot".to_string()]);
        assert_eq!(summaries[0].stats.unwrap().n, 10);

        let rejected = fits.read_fits(&written[0]).unwrap();
        assert_eq!(rejected.row("hot").unwrap().status, FitStatus::Rejected);
        assert_eq!(rejected.row("u3").unwrap().status, FitStatus::Fitted);
    }

    #[test]
    fn filter_defaults_to_every_group() {
        let source = MemoryStore::with_series([
            group("CT (NG)", vec![unit("1", 100, 10.0)]),
            group("Boiler (Coal)", vec![unit("2", 100, 10.0)]),
        ]);
        let mut dest = MemoryStore::new();
        run_filter(&source, &mut dest, &sequential_filter()).unwrap();
        assert_eq!(dest.series_groups().unwrap().len(), 2);
    }

    #[test]
    fn failing_group_is_not_written() {
        let source = MemoryStore::with_series([group("CT (NG)", vec![unit("1", 100, 10.0), unit("2", 100, 10.0)])]);
        let failing: Arc<dyn RegimeClusterer> = Arc::new(|unit: UnitSeries, _: usize, _: usize| {
            if unit.unit_id == "2" {
                Err(AppError::data("no density"))
            } else {
                Ok(unit)
            }
        });
        let filter = RegimeFilter::new(
            ClusterStrategies::uniform(failing),
            FilterConfig {
                parallel: false,
                ..FilterConfig::default()
            },
        )
        .unwrap();

        let mut dest = MemoryStore::new();
        let err = run_filter(&source, &mut dest, &filter).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains('2'));
        assert!(dest.series_groups().unwrap().is_empty());
    }

    #[test]
    fn named_missing_group_is_an_error() {
        let source = MemoryStore::new();
        let filter = RegimeFilter::new(
            ClusterStrategies::default(),
            FilterConfig {
                group_types: Some(vec!["CC (NG)".to_string()]),
                parallel: false,
                ..FilterConfig::default()
            },
        )
        .unwrap();
        let err = run_filter(&source, &mut MemoryStore::new(), &filter).unwrap_err();
        assert!(matches!(err, AppError::MissingGroup(_)));
    }

    #[test]
    fn skipped_groups_are_copied_to_destination() {
        let source = MemoryStore::with_series([group("CT (Oil)", vec![unit("1", 100, 10.0), unit("2", 100, 30.0)])]);
        let mut fits = MemoryStore::new();
        run_fit(&source, &fitter(), &mut fits).unwrap();

        let mut dest = MemoryStore::new();
        let summaries = run_reject(&mut fits, Some(&mut dest), &rejector(100)).unwrap();
        assert!(summaries[0].skipped);

        let group = GroupType::parse("CT (Oil)").unwrap();
        let copied = dest.read_fits(&group).unwrap();
        assert!(copied.same_values(&fits.read_fits(&group).unwrap()));
        assert_eq!(copied.fitted_count(), 2);
    }
}
