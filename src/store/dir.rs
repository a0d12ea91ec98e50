//! Directory-backed stores: one file per group.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::{FitTable, GroupTable, GroupType};
use crate::error::AppError;
use crate::io::{self, FitFormat, LoadBasis};
use crate::store::{FitStore, TimeSeriesStore};

/// Suffix between the group name and the extension of fit files.
const FITS_SUFFIX: &str = "_fits";

/// `<root>/<group>.csv` time-series files.
#[derive(Debug, Clone)]
pub struct SeriesDirectory {
    root: PathBuf,
    basis: LoadBasis,
}

impl SeriesDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            basis: LoadBasis::Net,
        }
    }

    /// Interpret source loads as gross generation.
    pub fn with_basis(mut self, basis: LoadBasis) -> Self {
        self.basis = basis;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, group: &GroupType) -> PathBuf {
        self.root.join(format!("{}.csv", group.name()))
    }
}

impl TimeSeriesStore for SeriesDirectory {
    fn series_groups(&self) -> Result<Vec<GroupType>, AppError> {
        let mut groups: Vec<GroupType> = list_files(&self.root)?
            .into_iter()
            .filter_map(|name| name.strip_suffix(".csv").map(str::to_string))
            .filter(|stem| !stem.ends_with(FITS_SUFFIX))
            .map(|stem| GroupType::parse(&stem))
            .collect::<Result<_, _>>()?;
        groups.sort();
        Ok(groups)
    }

    fn read_group(&self, group: &GroupType) -> Result<GroupTable, AppError> {
        let path = self.path_for(group);
        let file = open_group(&path, group)?;
        debug!(path = %path.display(), "reading time series");
        io::read_series(BufReader::new(file), group, self.basis)
    }

    fn write_group(&mut self, table: &GroupTable) -> Result<(), AppError> {
        let path = self.path_for(&table.group_type);
        let file = create_file(&self.root, &path)?;
        debug!(path = %path.display(), "writing time series");
        io::write_series(BufWriter::new(file), table)
    }
}

/// `<root>/<group>_fits.<ext>` fit tables.
///
/// Reads either format; writes the configured one.
#[derive(Debug, Clone)]
pub struct FitDirectory {
    root: PathBuf,
    format: FitFormat,
}

impl FitDirectory {
    /// Fails before touching the filesystem when `extension` is unsupported.
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Result<Self, AppError> {
        Ok(Self {
            root: root.into(),
            format: FitFormat::from_extension(extension)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> FitFormat {
        self.format
    }

    pub fn path_for(&self, group: &GroupType, format: FitFormat) -> PathBuf {
        self.root
            .join(format!("{}{FITS_SUFFIX}.{}", group.name(), format.extension()))
    }

    fn other_format(&self) -> FitFormat {
        match self.format {
            FitFormat::Csv => FitFormat::Json,
            FitFormat::Json => FitFormat::Csv,
        }
    }

    fn existing_path(&self, group: &GroupType) -> Option<(PathBuf, FitFormat)> {
        [self.format, self.other_format()]
            .into_iter()
            .map(|f| (self.path_for(group, f), f))
            .find(|(p, _)| p.is_file())
    }
}

impl FitStore for FitDirectory {
    fn fit_groups(&self) -> Result<Vec<GroupType>, AppError> {
        let mut groups: Vec<GroupType> = list_files(&self.root)?
            .into_iter()
            .filter_map(|name| {
                let (stem, ext) = name.rsplit_once('.')?;
                FitFormat::from_extension(ext).ok()?;
                stem.strip_suffix(FITS_SUFFIX).map(str::to_string)
            })
            .map(|stem| GroupType::parse(&stem))
            .collect::<Result<_, _>>()?;
        groups.sort();
        groups.dedup();
        Ok(groups)
    }

    fn read_fits(&self, group: &GroupType) -> Result<FitTable, AppError> {
        let (path, format) = self
            .existing_path(group)
            .ok_or_else(|| AppError::MissingGroup(group.to_string()))?;
        let file = File::open(&path).map_err(|e| AppError::io("open fit table", &path, e))?;
        debug!(path = %path.display(), "reading fit table");
        io::read_fits(BufReader::new(file), group, format)
    }

    fn write_fits(&mut self, table: &FitTable) -> Result<(), AppError> {
        let path = self.path_for(&table.group_type, self.format);
        let file = create_file(&self.root, &path)?;
        debug!(path = %path.display(), "writing fit table");
        io::write_fits(BufWriter::new(file), table, self.format)?;

        let stale = self.path_for(&table.group_type, self.other_format());
        if stale.is_file() {
            warn!(
                written = %path.display(),
                stale = %stale.display(),
                "fit table also present in the other format and left unchanged"
            );
        }
        Ok(())
    }
}

fn list_files(root: &Path) -> Result<Vec<String>, AppError> {
    let entries = fs::read_dir(root).map_err(|e| AppError::io("list directory", root, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::io("list directory", root, e))?;
        if entry.path().is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

fn open_group(path: &Path, group: &GroupType) -> Result<File, AppError> {
    if !path.is_file() {
        return Err(AppError::MissingGroup(group.to_string()));
    }
    File::open(path).map_err(|e| AppError::io("open time series", path, e))
}

fn create_file(root: &Path, path: &Path) -> Result<File, AppError> {
    fs::create_dir_all(root).map_err(|e| AppError::io("create directory", root, e))?;
    File::create(path).map_err(|e| AppError::io("create", path, e))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{CurveFit, FitStatus, OperatingPoint, UnitMeta, UnitSeries};

    fn series_table() -> GroupTable {
        let t0 = NaiveDate::from_ymd_opt(2016, 2, 29).unwrap().and_hms_opt(23, 0, 0).unwrap();
        let points = (0..3)
            .map(|h| OperatingPoint::new(t0 + chrono::Duration::hours(h), 100.0 + h as f64, 10.0))
            .collect();
        GroupTable::new(
            GroupType::parse("CT (NG)").unwrap(),
            vec![UnitSeries::new("42", UnitMeta::default(), points)],
        )
    }

    fn fit_table() -> FitTable {
        let row = CurveFit {
            fit_id: "42".to_string(),
            coefficients: vec![1.0, 2.0],
            load_min: 10.0,
            load_max: 20.0,
            load_samples: vec![10.0, 20.0],
            heat_rate_samples: vec![12.0, 22.0],
            total_load: 30.0,
            min_gen_perc: 0.5,
            min_heat_rate: f64::NAN,
            status: FitStatus::Fitted,
            meta: UnitMeta::default(),
        };
        FitTable::new(GroupType::parse("CT (NG)").unwrap(), 1, 2, vec![row])
    }

    #[test]
    fn series_directory_round_trips_groups() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SeriesDirectory::new(dir.path().join("filtered"));
        store.write_group(&series_table()).unwrap();

        assert!(dir.path().join("filtered").join("CT (NG).csv").is_file());
        let groups = store.series_groups().unwrap();
        assert_eq!(groups, vec![GroupType::parse("CT (NG)").unwrap()]);

        let back = store.read_group(&groups[0]).unwrap();
        assert_eq!(back.point_count(), 3);
        assert_eq!(back.units[0].points[2].load, 102.0);
    }

    #[test]
    fn absent_files_are_missing_groups() {
        let dir = tempfile::tempdir().unwrap();
        let group = GroupType::parse("Boiler (Coal)").unwrap();

        let err = SeriesDirectory::new(dir.path()).read_group(&group).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        let err = FitDirectory::new(dir.path(), "csv").unwrap().read_fits(&group).unwrap_err();
        assert!(matches!(err, AppError::MissingGroup(_)));
    }

    #[test]
    fn fit_directory_uses_group_fits_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FitDirectory::new(dir.path(), "json").unwrap();
        store.write_fits(&fit_table()).unwrap();

        assert!(dir.path().join("CT (NG)_fits.json").is_file());
        let groups = store.fit_groups().unwrap();
        assert_eq!(groups.len(), 1);

        // A CSV-configured store still finds the JSON table.
        let csv_store = FitDirectory::new(dir.path(), "csv").unwrap();
        let back = csv_store.read_fits(&groups[0]).unwrap();
        assert!(back.same_values(&fit_table()));
    }

    #[test]
    fn rewriting_in_another_format_reads_back_the_new_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut json = FitDirectory::new(dir.path(), "json").unwrap();
        json.write_fits(&fit_table()).unwrap();

        let mut csv = FitDirectory::new(dir.path(), "csv").unwrap();
        let group = GroupType::parse("CT (NG)").unwrap();
        let mut table = csv.read_fits(&group).unwrap();
        table.rows[0] = table.rows[0].invalidated();
        csv.write_fits(&table).unwrap();

        assert!(dir.path().join("CT (NG)_fits.json").is_file());
        assert!(dir.path().join("CT (NG)_fits.csv").is_file());
        let back = csv.read_fits(&group).unwrap();
        assert_eq!(back.rows[0].status, FitStatus::Rejected);
        assert_eq!(csv.fit_groups().unwrap().len(), 1);
    }

    #[test]
    fn unsupported_extension_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        let err = FitDirectory::new(&root, "xlsx").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!root.exists());
    }

    #[test]
    fn series_listing_ignores_fit_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut fits = FitDirectory::new(dir.path(), "csv").unwrap();
        fits.write_fits(&fit_table()).unwrap();
        let mut series = SeriesDirectory::new(dir.path());
        series.write_group(&series_table()).unwrap();

        assert_eq!(series.series_groups().unwrap().len(), 1);
        assert_eq!(fits.fit_groups().unwrap().len(), 1);
    }
}
