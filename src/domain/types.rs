//! Shared domain types for operating-point time series.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - read from / written to the time-series store
//! - handed to clustering jobs on worker threads
//! - carried through fitting as plain owned data

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Regime label attached to every operating point.
///
/// `-1` marks noise / transients, `0..k` are stable operating regimes.
pub type RegimeLabel = i32;

/// Label for points excluded from every regime.
pub const NOISE_LABEL: RegimeLabel = -1;

/// Generator technology part of a group type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    Boiler,
    CombustionTurbine,
    /// Combined-cycle units assembled from several sub-units.
    CombinedCycle,
    Other,
}

impl UnitKind {
    fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "Boiler" => UnitKind::Boiler,
            "CT" => UnitKind::CombustionTurbine,
            "CC" => UnitKind::CombinedCycle,
            _ => UnitKind::Other,
        }
    }

    pub fn is_combined_cycle(self) -> bool {
        self == UnitKind::CombinedCycle
    }
}

/// Fuel part of a group type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FuelType {
    Coal,
    OtherSolidFuel,
    NaturalGas,
    Oil,
    Other,
}

impl FuelType {
    fn from_label(label: &str) -> Self {
        match label {
            "Coal" => FuelType::Coal,
            "Other Solid Fuel" => FuelType::OtherSolidFuel,
            "NG" => FuelType::NaturalGas,
            "Oil" => FuelType::Oil,
            _ => FuelType::Other,
        }
    }

    /// Multiplier converting gross generation to net generation.
    pub fn gross_to_net(self) -> f64 {
        match self {
            FuelType::Coal | FuelType::OtherSolidFuel => 0.925,
            FuelType::NaturalGas | FuelType::Oil => 0.963,
            FuelType::Other => 1.0,
        }
    }
}

/// A generator-type × fuel-type category, e.g. `"CT (NG)"`.
///
/// The original string is kept verbatim as the store key; kind and fuel are
/// resolved once at parse time so dispatch never string-matches again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupType {
    name: String,
    kind: UnitKind,
    fuel: Option<FuelType>,
}

impl GroupType {
    pub fn parse(name: &str) -> Result<Self, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::config("Group type must not be empty."));
        }

        let (prefix, fuel) = match name.split_once(" (") {
            Some((prefix, rest)) => {
                let label = rest.strip_suffix(')').ok_or_else(|| {
                    AppError::config(format!("Malformed group type '{name}': missing ')'"))
                })?;
                (prefix, Some(FuelType::from_label(label.trim())))
            }
            None => (name, None),
        };

        Ok(Self {
            name: name.to_string(),
            kind: UnitKind::from_prefix(prefix.trim()),
            fuel,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn fuel(&self) -> Option<FuelType> {
        self.fuel
    }

    pub fn is_combined_cycle(&self) -> bool {
        self.kind.is_combined_cycle()
    }

    /// Gross-to-net multiplier for this group's fuel (1.0 when unknown).
    pub fn gross_to_net(&self) -> f64 {
        self.fuel.map_or(1.0, FuelType::gross_to_net)
    }
}

impl FromStr for GroupType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GroupType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GroupType> for String {
    fn from(value: GroupType) -> Self {
        value.name
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Static metadata copied from the unit onto every fit row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitMeta {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub state: Option<String>,
    #[serde(rename = "EPA_region")]
    pub epa_region: Option<String>,
    #[serde(rename = "NERC_region")]
    pub nerc_region: Option<String>,
    pub unit_type: Option<String>,
    pub fuel_type: Option<String>,
    pub group_type: Option<String>,
}

/// One hourly (load, heat rate) observation of a unit.
///
/// `load` is net generation; `heat_rate` is the matching net heat rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingPoint {
    pub timestamp: NaiveDateTime,
    pub load: f64,
    pub heat_rate: f64,
    pub regime: RegimeLabel,
}

impl OperatingPoint {
    pub fn new(timestamp: NaiveDateTime, load: f64, heat_rate: f64) -> Self {
        Self {
            timestamp,
            load,
            heat_rate,
            regime: NOISE_LABEL,
        }
    }

    /// Build a net point from gross generation.
    ///
    /// Heat rate is divided by the same multiplier so fuel input over energy
    /// output stays consistent.
    pub fn from_gross(timestamp: NaiveDateTime, gross_load: f64, heat_rate: f64, multiplier: f64) -> Self {
        Self::new(timestamp, gross_load * multiplier, heat_rate / multiplier)
    }

    pub fn is_retained(&self) -> bool {
        self.regime >= 0
    }
}

/// All observations of a single unit, ordered by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSeries {
    pub unit_id: String,
    pub meta: UnitMeta,
    pub points: Vec<OperatingPoint>,
}

impl UnitSeries {
    pub fn new(unit_id: impl Into<String>, meta: UnitMeta, points: Vec<OperatingPoint>) -> Self {
        Self {
            unit_id: unit_id.into(),
            meta,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sorted, de-duplicated regime labels `>= 0`.
    pub fn retained_labels(&self) -> Vec<RegimeLabel> {
        let mut labels: Vec<RegimeLabel> = self
            .points
            .iter()
            .filter(|p| p.is_retained())
            .map(|p| p.regime)
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Copy of this series with every label reset to noise.
    pub fn unlabeled(&self) -> Self {
        let mut out = self.clone();
        for p in &mut out.points {
            p.regime = NOISE_LABEL;
        }
        out
    }

    pub fn sort_by_time(&mut self) {
        self.points.sort_by_key(|p| p.timestamp);
    }
}

/// Every unit of one group type.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTable {
    pub group_type: GroupType,
    pub units: Vec<UnitSeries>,
}

impl GroupTable {
    pub fn new(group_type: GroupType, units: Vec<UnitSeries>) -> Self {
        let mut table = Self { group_type, units };
        table.sort();
        table
    }

    /// Restore `(unit_id, timestamp)` ordering.
    pub fn sort(&mut self) {
        self.units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        for unit in &mut self.units {
            unit.sort_by_time();
        }
    }

    pub fn unit(&self, unit_id: &str) -> Option<&UnitSeries> {
        self.units.iter().find(|u| u.unit_id == unit_id)
    }

    pub fn point_count(&self) -> usize {
        self.units.iter().map(UnitSeries::len).sum()
    }
}
