//! Fit table codecs.
//!
//! CSV layout (one row per fit id):
//!
//! `unit_id, a{order}..a0, load_min, load_2..load_{N-1}, load_max, total_load,
//! min_gen_perc, heat_rate(load_min)..heat_rate(load_max), min_heat_rate,
//! status, <metadata>`
//!
//! Order and sample count are recovered from the header on read. Missing
//! values are empty fields in CSV and `null` in JSON; both read back as `NaN`.

use std::collections::HashMap;
use std::io::{Read, Write};

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::domain::{CurveFit, FitStatus, FitTable, GroupType, UnitMeta};
use crate::error::AppError;
use crate::io::FitFormat;

const META_COLUMNS: [&str; 8] = [
    "latitude",
    "longitude",
    "state",
    "EPA_region",
    "NERC_region",
    "unit_type",
    "fuel_type",
    "group_type",
];

pub fn read_fits<R: Read>(reader: R, group_type: &GroupType, format: FitFormat) -> Result<FitTable, AppError> {
    match format {
        FitFormat::Csv => read_fits_csv(reader, group_type),
        FitFormat::Json => read_fits_json(reader, group_type),
    }
}

pub fn write_fits<W: Write>(writer: W, table: &FitTable, format: FitFormat) -> Result<(), AppError> {
    match format {
        FitFormat::Csv => write_fits_csv(writer, table),
        FitFormat::Json => write_fits_json(writer, table),
    }
}

/// Header names for a table of the given order and sample count.
pub fn fit_columns(order: usize, points: usize) -> Vec<String> {
    let loads = load_columns(points);
    let mut cols = vec!["unit_id".to_string()];
    cols.extend((0..=order).rev().map(|i| format!("a{i}")));
    cols.extend(loads.iter().cloned());
    cols.push("total_load".to_string());
    cols.push("min_gen_perc".to_string());
    cols.extend(loads.iter().map(|l| format!("heat_rate({l})")));
    cols.push("min_heat_rate".to_string());
    cols.push("status".to_string());
    cols.extend(META_COLUMNS.iter().map(|c| c.to_string()));
    cols
}

fn load_columns(points: usize) -> Vec<String> {
    let mut cols = vec!["load_min".to_string()];
    cols.extend((2..points).map(|i| format!("load_{i}")));
    if points >= 2 {
        cols.push("load_max".to_string());
    }
    cols
}

fn fmt_f64(v: f64) -> String {
    if v.is_nan() { String::new() } else { v.to_string() }
}

fn fmt_opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_default()
}

pub fn write_fits_csv<W: Write>(writer: W, table: &FitTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(fit_columns(table.order, table.points))?;

    for row in &table.rows {
        if row.coefficients.len() != table.order + 1 || row.load_samples.len() != table.points {
            return Err(AppError::data(format!(
                "{}: fit '{}' does not match table shape (order {}, {} points)",
                table.group_type, row.fit_id, table.order, table.points
            )));
        }
        let mut record = vec![row.fit_id.clone()];
        record.extend(row.coefficients.iter().map(|&v| fmt_f64(v)));
        record.extend(row.load_samples.iter().map(|&v| fmt_f64(v)));
        record.push(fmt_f64(row.total_load));
        record.push(fmt_f64(row.min_gen_perc));
        record.extend(row.heat_rate_samples.iter().map(|&v| fmt_f64(v)));
        record.push(fmt_f64(row.min_heat_rate));
        record.push(row.status.as_str().to_string());

        let meta = &row.meta;
        record.push(fmt_opt(&meta.latitude));
        record.push(fmt_opt(&meta.longitude));
        record.push(fmt_opt(&meta.state));
        record.push(fmt_opt(&meta.epa_region));
        record.push(fmt_opt(&meta.nerc_region));
        record.push(fmt_opt(&meta.unit_type));
        record.push(fmt_opt(&meta.fuel_type));
        record.push(fmt_opt(&meta.group_type));
        writer.write_record(&record)?;
    }

    writer
        .flush()
        .map_err(|e| AppError::data(format!("{}: failed to flush fit CSV: {e}", table.group_type)))?;
    Ok(())
}

/// Column positions resolved from a fit CSV header.
struct FitLayout {
    index: HashMap<String, usize>,
    order: usize,
    loads: Vec<String>,
}

impl FitLayout {
    fn from_headers(headers: &StringRecord, group_type: &GroupType) -> Result<Self, AppError> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().trim_start_matches('\u{feff}').to_string(), i))
            .collect();

        for required in ["unit_id", "load_min", "load_max"] {
            if !index.contains_key(required) {
                return Err(AppError::data(format!(
                    "{group_type}: fit table is missing required column `{required}`"
                )));
            }
        }

        let order = index
            .keys()
            .filter_map(|name| name.strip_prefix('a')?.parse::<usize>().ok())
            .max()
            .ok_or_else(|| AppError::data(format!("{group_type}: fit table has no coefficient columns")))?;

        let interior = index
            .keys()
            .filter_map(|name| name.strip_prefix("load_")?.parse::<usize>().ok())
            .count();

        Ok(Self {
            index,
            order,
            loads: load_columns(interior + 2),
        })
    }

    fn field<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        let idx = *self.index.get(name)?;
        record.get(idx).map(str::trim).filter(|s| !s.is_empty())
    }

    fn text(&self, record: &StringRecord, name: &str) -> Option<String> {
        self.field(record, name).map(str::to_string)
    }

    fn number(&self, record: &StringRecord, name: &str, line: usize) -> Result<f64, AppError> {
        match self.field(record, name) {
            None => Ok(f64::NAN),
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|e| AppError::data(format!("line {line}: column `{name}`: invalid number '{raw}': {e}"))),
        }
    }

    fn row(&self, record: &StringRecord, line: usize) -> Result<CurveFit, AppError> {
        let fit_id = self
            .text(record, "unit_id")
            .ok_or_else(|| AppError::data(format!("line {line}: empty unit_id")))?;

        let coefficients = (0..=self.order)
            .rev()
            .map(|i| self.number(record, &format!("a{i}"), line))
            .collect::<Result<Vec<_>, _>>()?;
        let load_samples = self
            .loads
            .iter()
            .map(|l| self.number(record, l, line))
            .collect::<Result<Vec<_>, _>>()?;
        let heat_rate_samples = self
            .loads
            .iter()
            .map(|l| self.number(record, &format!("heat_rate({l})"), line))
            .collect::<Result<Vec<_>, _>>()?;

        let status = match self.field(record, "status") {
            Some(raw) => FitStatus::parse(raw)
                .ok_or_else(|| AppError::data(format!("line {line}: unknown fit status '{raw}'")))?,
            None if coefficients.iter().all(|c| c.is_finite()) => FitStatus::Fitted,
            None => FitStatus::NoFit,
        };

        let latitude = self.number(record, "latitude", line)?;
        let longitude = self.number(record, "longitude", line)?;
        let meta = UnitMeta {
            latitude: Some(latitude).filter(|v| !v.is_nan()),
            longitude: Some(longitude).filter(|v| !v.is_nan()),
            state: self.text(record, "state"),
            epa_region: self.text(record, "EPA_region"),
            nerc_region: self.text(record, "NERC_region"),
            unit_type: self.text(record, "unit_type"),
            fuel_type: self.text(record, "fuel_type"),
            group_type: self.text(record, "group_type"),
        };

        Ok(CurveFit {
            fit_id,
            coefficients,
            load_min: load_samples.first().copied().unwrap_or(f64::NAN),
            load_max: load_samples.last().copied().unwrap_or(f64::NAN),
            load_samples,
            heat_rate_samples,
            total_load: self.number(record, "total_load", line)?,
            min_gen_perc: self.number(record, "min_gen_perc", line)?,
            min_heat_rate: self.number(record, "min_heat_rate", line)?,
            status,
            meta,
        })
    }
}

pub fn read_fits_csv<R: Read>(reader: R, group_type: &GroupType) -> Result<FitTable, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();
    let layout = FitLayout::from_headers(&headers, group_type)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let row = layout
            .row(&record, idx + 2)
            .map_err(|e| AppError::data(format!("{group_type}: {e}")))?;
        rows.push(row);
    }

    Ok(FitTable::new(group_type.clone(), layout.order, layout.loads.len(), rows))
}

#[derive(Debug, Serialize, Deserialize)]
struct FitDocument {
    group_type: GroupType,
    order: usize,
    points: usize,
    fits: Vec<FitRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FitRecord {
    unit_id: String,
    coefficients: Vec<Option<f64>>,
    load_samples: Vec<Option<f64>>,
    heat_rate_samples: Vec<Option<f64>>,
    total_load: Option<f64>,
    min_gen_perc: Option<f64>,
    min_heat_rate: Option<f64>,
    status: FitStatus,
    #[serde(flatten)]
    meta: UnitMeta,
}

fn some(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

fn some_all(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|&v| some(v)).collect()
}

fn nan(v: Option<f64>) -> f64 {
    v.unwrap_or(f64::NAN)
}

fn nan_all(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|&v| nan(v)).collect()
}

impl From<&CurveFit> for FitRecord {
    fn from(row: &CurveFit) -> Self {
        Self {
            unit_id: row.fit_id.clone(),
            coefficients: some_all(&row.coefficients),
            load_samples: some_all(&row.load_samples),
            heat_rate_samples: some_all(&row.heat_rate_samples),
            total_load: some(row.total_load),
            min_gen_perc: some(row.min_gen_perc),
            min_heat_rate: some(row.min_heat_rate),
            status: row.status,
            meta: row.meta.clone(),
        }
    }
}

impl From<FitRecord> for CurveFit {
    fn from(record: FitRecord) -> Self {
        let load_samples = nan_all(&record.load_samples);
        Self {
            fit_id: record.unit_id,
            coefficients: nan_all(&record.coefficients),
            load_min: load_samples.first().copied().unwrap_or(f64::NAN),
            load_max: load_samples.last().copied().unwrap_or(f64::NAN),
            load_samples,
            heat_rate_samples: nan_all(&record.heat_rate_samples),
            total_load: nan(record.total_load),
            min_gen_perc: nan(record.min_gen_perc),
            min_heat_rate: nan(record.min_heat_rate),
            status: record.status,
            meta: record.meta,
        }
    }
}

pub fn write_fits_json<W: Write>(mut writer: W, table: &FitTable) -> Result<(), AppError> {
    let doc = FitDocument {
        group_type: table.group_type.clone(),
        order: table.order,
        points: table.points,
        fits: table.rows.iter().map(FitRecord::from).collect(),
    };
    serde_json::to_writer_pretty(&mut writer, &doc)?;
    writer
        .flush()
        .map_err(|e| AppError::data(format!("{}: failed to flush fit JSON: {e}", table.group_type)))?;
    Ok(())
}

pub fn read_fits_json<R: Read>(reader: R, group_type: &GroupType) -> Result<FitTable, AppError> {
    let doc: FitDocument = serde_json::from_reader(reader)?;
    if &doc.group_type != group_type {
        return Err(AppError::data(format!(
            "fit document holds group '{}', expected '{group_type}'",
            doc.group_type
        )));
    }
    let rows = doc.fits.into_iter().map(CurveFit::from).collect();
    Ok(FitTable::new(doc.group_type, doc.order, doc.points, rows))
}
