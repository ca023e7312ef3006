use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::MetricsRecord;
use crate::structures::config::StatusThresholds;

pub const ABSENT: &str = "NA";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "&'static str")]
pub enum Status {
    Ok,
    Critical,
    #[default]
    Na,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Critical => "CRITICAL",
            Status::Na => ABSENT,
        }
    }

    fn present<T>(value: Option<T>) -> Self {
        match value {
            Some(_) => Status::Ok,
            None => Status::Na,
        }
    }
}

/// Missing cells and unknown text read as `NA`.
impl From<Option<String>> for Status {
    fn from(s: Option<String>) -> Self {
        match s.as_deref().map(str::trim) {
            Some("OK") => Status::Ok,
            Some("CRITICAL") => Status::Critical,
            _ => Status::Na,
        }
    }
}

impl From<Status> for &'static str {
    fn from(status: Status) -> Self {
        status.as_str()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the reading history. Column names are the log's header row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingRow {
    pub timestamp_iso: String,
    pub sensor: String,
    #[serde(with = "na")]
    pub temperature_c: Option<f64>,
    #[serde(with = "na")]
    pub moisture_pct: Option<f64>,
    #[serde(with = "na")]
    pub ec_us_cm: Option<f64>,
    #[serde(with = "na")]
    pub ph: Option<f64>,
    #[serde(with = "na")]
    pub nitrogen: Option<f64>,
    #[serde(with = "na")]
    pub phosphorus: Option<f64>,
    #[serde(with = "na")]
    pub potassium: Option<f64>,
    pub temperature_status: Status,
    pub moisture_status: Status,
    pub ec_status: Status,
    pub ph_status: Status,
    pub overall_status: Status,
}

impl ReadingRow {
    pub fn new(
        timestamp_iso: String,
        sensor: &str,
        metrics: &MetricsRecord,
        thresholds: &StatusThresholds,
    ) -> Self {
        let temperature_status = match metrics.temperature_c {
            Some(t) if t < thresholds.temperature_critical_low => Status::Critical,
            Some(t) if t > thresholds.temperature_critical_high => Status::Critical,
            t => Status::present(t),
        };
        let moisture_status = Status::present(metrics.moisture_pct);
        let ec_status = Status::present(metrics.ec_us_cm);
        let ph_status = Status::present(metrics.acidity_ph);
        let overall_status = if [temperature_status, moisture_status, ec_status, ph_status]
            .contains(&Status::Critical)
        {
            Status::Critical
        } else {
            Status::Ok
        };

        Self {
            timestamp_iso,
            sensor: sensor.to_string(),
            temperature_c: metrics.temperature_c,
            moisture_pct: metrics.moisture_pct,
            ec_us_cm: metrics.ec_us_cm,
            ph: metrics.acidity_ph,
            nitrogen: metrics.nitrogen,
            phosphorus: metrics.phosphorus,
            potassium: metrics.potassium,
            temperature_status,
            moisture_status,
            ec_status,
            ph_status,
            overall_status,
        }
    }

    pub fn metrics(&self) -> MetricsRecord {
        MetricsRecord {
            temperature_c: self.temperature_c,
            moisture_pct: self.moisture_pct,
            ec_us_cm: self.ec_us_cm,
            acidity_ph: self.ph,
            nitrogen: self.nitrogen,
            phosphorus: self.phosphorus,
            potassium: self.potassium,
        }
    }
}

/// Optional numbers stored as the `NA` token when absent. Reading accepts a
/// number, `NA`, an empty cell or anything unparsable (treated as absent).
pub mod na {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ABSENT;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_str(ABSENT),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Cell>::deserialize(deserializer)? {
            Some(Cell::Number(v)) => Some(v),
            Some(Cell::Text(s)) => s.trim().parse().ok(),
            None => None,
        })
    }
}
