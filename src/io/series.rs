//! Time-series CSV codec.
//!
//! One row per (unit, hour): `unit_id,time,load,heat_rate,cluster` followed
//! by the unit metadata columns. Missing `cluster` values read as noise.
//! Written loads are always net.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{GroupTable, GroupType, NOISE_LABEL, OperatingPoint, RegimeLabel, UnitMeta, UnitSeries};
use crate::error::AppError;

/// Timestamp layout of the `time` column.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How the `load` column of a source should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBasis {
    /// Loads and heat rates are already net.
    #[default]
    Net,
    /// Loads are gross generation; convert with the group's fuel multiplier.
    Gross,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeriesRecord {
    unit_id: String,
    time: String,
    load: Option<f64>,
    heat_rate: Option<f64>,
    cluster: Option<RegimeLabel>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    state: Option<String>,
    #[serde(rename = "EPA_region")]
    epa_region: Option<String>,
    #[serde(rename = "NERC_region")]
    nerc_region: Option<String>,
    unit_type: Option<String>,
    fuel_type: Option<String>,
    group_type: Option<String>,
}

impl SeriesRecord {
    fn meta(&self) -> UnitMeta {
        UnitMeta {
            latitude: self.latitude,
            longitude: self.longitude,
            state: self.state.clone(),
            epa_region: self.epa_region.clone(),
            nerc_region: self.nerc_region.clone(),
            unit_type: self.unit_type.clone(),
            fuel_type: self.fuel_type.clone(),
            group_type: self.group_type.clone(),
        }
    }

    fn from_point(unit: &UnitSeries, point: &OperatingPoint) -> Self {
        let meta = &unit.meta;
        Self {
            unit_id: unit.unit_id.clone(),
            time: point.timestamp.format(TIME_FORMAT).to_string(),
            load: Some(point.load).filter(|v| !v.is_nan()),
            heat_rate: Some(point.heat_rate).filter(|v| !v.is_nan()),
            cluster: Some(point.regime),
            latitude: meta.latitude,
            longitude: meta.longitude,
            state: meta.state.clone(),
            epa_region: meta.epa_region.clone(),
            nerc_region: meta.nerc_region.clone(),
            unit_type: meta.unit_type.clone(),
            fuel_type: meta.fuel_type.clone(),
            group_type: meta.group_type.clone(),
        }
    }
}

/// Read one group's time series.
///
/// Rows may arrive in any order; the returned table is sorted by unit id and
/// timestamp. Unit metadata is taken from the unit's earliest row, whatever
/// the row order in the file.
pub fn read_series<R: Read>(reader: R, group_type: &GroupType, basis: LoadBasis) -> Result<GroupTable, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let multiplier = group_type.gross_to_net();
    let mut units: BTreeMap<String, (NaiveDateTime, UnitSeries)> = BTreeMap::new();

    for (idx, result) in reader.deserialize::<SeriesRecord>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = result?;
        let timestamp = NaiveDateTime::parse_from_str(&record.time, TIME_FORMAT).map_err(|e| {
            AppError::data(format!(
                "{group_type}: line {line}: invalid time '{}' (expected {TIME_FORMAT}): {e}",
                record.time
            ))
        })?;

        let load = record.load.unwrap_or(f64::NAN);
        let heat_rate = record.heat_rate.unwrap_or(f64::NAN);
        let mut point = match basis {
            LoadBasis::Net => OperatingPoint::new(timestamp, load, heat_rate),
            LoadBasis::Gross => OperatingPoint::from_gross(timestamp, load, heat_rate, multiplier),
        };
        point.regime = record.cluster.unwrap_or(NOISE_LABEL);

        let (meta_time, unit) = units
            .entry(record.unit_id.clone())
            .or_insert_with(|| (timestamp, UnitSeries::new(record.unit_id.clone(), record.meta(), Vec::new())));
        if timestamp < *meta_time {
            *meta_time = timestamp;
            unit.meta = record.meta();
        }
        unit.points.push(point);
    }

    let units = units.into_values().map(|(_, unit)| unit).collect();
    Ok(GroupTable::new(group_type.clone(), units))
}

/// Write one group's time series, labels included.
pub fn write_series<W: Write>(writer: W, table: &GroupTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(writer);
    for unit in &table.units {
        for point in &unit.points {
            writer.serialize(SeriesRecord::from_point(unit, point))?;
        }
    }
    writer
        .flush()
        .map_err(|e| AppError::data(format!("{}: failed to flush series CSV: {e}", table.group_type)))?;
    Ok(())
}
