use std::fmt;

use regex::Regex;

use crate::extract::{Field, FieldResult};
use crate::structures::errors::SoilwatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TemperatureC,
    MoisturePct,
    EcUsCm,
    AcidityPh,
    Nitrogen,
    Phosphorus,
    Potassium,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::TemperatureC,
        Metric::MoisturePct,
        Metric::EcUsCm,
        Metric::AcidityPh,
        Metric::Nitrogen,
        Metric::Phosphorus,
        Metric::Potassium,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::TemperatureC => "temperature_c",
            Metric::MoisturePct => "moisture_pct",
            Metric::EcUsCm => "ec_us_cm",
            Metric::AcidityPh => "acidity_ph",
            Metric::Nitrogen => "nitrogen",
            Metric::Phosphorus => "phosphorus",
            Metric::Potassium => "potassium",
        }
    }

    /// Field the metric is parsed from.
    pub fn field(self) -> Field {
        match self {
            Metric::TemperatureC => Field::Temperature,
            Metric::MoisturePct => Field::Moisture,
            Metric::EcUsCm => Field::ElectricConductivity,
            Metric::AcidityPh => Field::Acidity,
            Metric::Nitrogen => Field::Nitrogen,
            Metric::Phosphorus => Field::Phosphorus,
            Metric::Potassium => Field::Potassium,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit-stripped numeric readings. `None` means the page had no usable value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsRecord {
    pub temperature_c: Option<f64>,
    pub moisture_pct: Option<f64>,
    pub ec_us_cm: Option<f64>,
    pub acidity_ph: Option<f64>,
    pub nitrogen: Option<f64>,
    pub phosphorus: Option<f64>,
    pub potassium: Option<f64>,
}

impl MetricsRecord {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TemperatureC => self.temperature_c,
            Metric::MoisturePct => self.moisture_pct,
            Metric::EcUsCm => self.ec_us_cm,
            Metric::AcidityPh => self.acidity_ph,
            Metric::Nitrogen => self.nitrogen,
            Metric::Phosphorus => self.phosphorus,
            Metric::Potassium => self.potassium,
        }
    }

    fn slot(&mut self, metric: Metric) -> &mut Option<f64> {
        match metric {
            Metric::TemperatureC => &mut self.temperature_c,
            Metric::MoisturePct => &mut self.moisture_pct,
            Metric::EcUsCm => &mut self.ec_us_cm,
            Metric::AcidityPh => &mut self.acidity_ph,
            Metric::Nitrogen => &mut self.nitrogen,
            Metric::Phosphorus => &mut self.phosphorus,
            Metric::Potassium => &mut self.potassium,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, Option<f64>)> + '_ {
        Metric::ALL.into_iter().map(move |metric| (metric, self.get(metric)))
    }
}

#[derive(Debug, Clone)]
pub struct MetricsBuilder {
    number: Regex,
}

impl MetricsBuilder {
    pub fn new() -> Result<Self, SoilwatchError> {
        Ok(Self {
            number: Regex::new(r"[-+]?[0-9]*\.?[0-9]+")?,
        })
    }

    pub fn build(&self, fields: &FieldResult) -> MetricsRecord {
        let mut record = MetricsRecord::default();
        for metric in Metric::ALL {
            *record.slot(metric) = fields.get(metric.field()).and_then(|s| self.parse_num(s));
        }
        record
    }

    /// Leading signed decimal token of `s`.
    pub fn parse_num(&self, s: &str) -> Option<f64> {
        self.number.find(s)?.as_str().parse().ok()
    }
}
