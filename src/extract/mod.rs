pub mod npk;
pub mod rules;

use std::fmt;

use regex::Regex;

use self::npk::{Npk, NpkDisambiguator, Nutrient};
use self::rules::{count_ci, first_match, search_near, Rule, DECIMAL};
use crate::structures::errors::SoilwatchError;

/// pH token: integer with up to two decimals.
const PH_DECIMAL: &str = r"[0-9]+(?:\.[0-9]{1,2})?";
const PH_RADIUS: usize = 40;
const PH_LABELS: [&str; 3] = ["pH", "Acidity", "ACIDITY"];
const NO_DATA_MARKERS: [&str; 2] = ["no data", "field not found"];
const NO_DATA_LIMIT: usize = 3;

pub const SECTION_FOUND: &str = "✓ Section Found";
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    GrowingParametersFound,
    Temperature,
    Moisture,
    ElectricConductivity,
    Acidity,
    Nitrogen,
    Phosphorus,
    Potassium,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::GrowingParametersFound,
        Field::Temperature,
        Field::Moisture,
        Field::ElectricConductivity,
        Field::Acidity,
        Field::Nitrogen,
        Field::Phosphorus,
        Field::Potassium,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::GrowingParametersFound => "Growing Parameters",
            Field::Temperature => "Temperature",
            Field::Moisture => "Moisture",
            Field::ElectricConductivity => "Electric Conductivity",
            Field::Acidity => "Acidity",
            Field::Nitrogen => "Nitrogen",
            Field::Phosphorus => "Phosphorus",
            Field::Potassium => "Potassium",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataQuality {
    #[default]
    Good,
    PoorNoData,
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataQuality::Good => "GOOD",
            DataQuality::PoorNoData => "POOR_NO_DATA",
        })
    }
}

/// Display strings for every field found on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldResult {
    pub growing_parameters: Option<String>,
    pub temperature: Option<String>,
    pub moisture: Option<String>,
    pub electric_conductivity: Option<String>,
    pub acidity: Option<String>,
    pub npk: Npk,
    pub data_quality: DataQuality,
}

impl FieldResult {
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::GrowingParametersFound => self.growing_parameters.as_deref(),
            Field::Temperature => self.temperature.as_deref(),
            Field::Moisture => self.moisture.as_deref(),
            Field::ElectricConductivity => self.electric_conductivity.as_deref(),
            Field::Acidity => self.acidity.as_deref(),
            Field::Nitrogen => self.npk.get(Nutrient::Nitrogen),
            Field::Phosphorus => self.npk.get(Nutrient::Phosphorus),
            Field::Potassium => self.npk.get(Nutrient::Potassium),
        }
    }

    /// Field value for display, `N/A` when absent.
    pub fn display(&self, field: Field) -> &str {
        self.get(field).unwrap_or(NOT_AVAILABLE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<&str>)> + '_ {
        Field::ALL.into_iter().map(move |field| (field, self.get(field)))
    }
}

fn ph_in_range(v: f64) -> bool {
    v > 0.0 && v <= 14.0
}

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    section_marker: Regex,
    conductivity: Vec<Rule>,
    temperature: Vec<Rule>,
    moisture: Vec<Rule>,
    acidity: Vec<Rule>,
    ph_labels: Vec<Regex>,
    ph_number: Regex,
    npk: NpkDisambiguator,
}

impl FieldExtractor {
    pub fn new() -> Result<Self, SoilwatchError> {
        Ok(Self {
            section_marker: Regex::new(r"(?i)GROWING\s*PARAMETERS")?,
            conductivity: vec![
                Rule::new("micro-siemens unit", r"(\d{1,5})\s*[µuμ]S/cm")?,
                Rule::new("conductivity label", r"Electric\s*Conductivity[:\s]*(\d{1,5})")?,
                Rule::new("EC label", r"\bEC\b[:\s]*(\d{1,5})")?,
            ],
            temperature: vec![
                Rule::new("celsius unit", &format!(r"({DECIMAL})\s*°C"))?,
                Rule::new("temperature label", &format!(r"\bTemperature\b[:\s]*({DECIMAL})"))?,
            ],
            moisture: vec![
                Rule::new("moisture label", &format!(r"\bMoisture\b[:\s]*({DECIMAL})\s*%"))?,
                Rule::new("trailing moisture label", &format!(r"({DECIMAL})\s*%\s*\bMoisture\b"))?,
            ],
            acidity: vec![
                Rule::bounded("pH label", &format!(r"\bpH\b[:\s]*({PH_DECIMAL})"), ph_in_range)?,
                Rule::bounded("trailing pH", &format!(r"({PH_DECIMAL})\s*\bpH\b"), ph_in_range)?,
                Rule::bounded("acidity label", &format!(r"\bAcidity\b[:\s]*({PH_DECIMAL})"), ph_in_range)?,
                Rule::bounded("ACIDITY label", &format!(r"\bACIDITY\b[:\s]*({PH_DECIMAL})"), ph_in_range)?,
            ],
            ph_labels: PH_LABELS
                .iter()
                .map(|label| Regex::new(&format!("(?i){}", regex::escape(label))))
                .collect::<Result<_, _>>()?,
            ph_number: Regex::new(&format!("({PH_DECIMAL})"))?,
            npk: NpkDisambiguator::new()?,
        })
    }

    pub fn extract(&self, text: &str) -> FieldResult {
        FieldResult {
            growing_parameters: self
                .section_marker
                .is_match(text)
                .then(|| SECTION_FOUND.to_string()),
            electric_conductivity: first_match(&self.conductivity, text)
                .map(|c| format!("{} µS/cm", c.raw)),
            temperature: first_match(&self.temperature, text).map(|c| format!("{} °C", c.raw)),
            moisture: first_match(&self.moisture, text).map(|c| format!("{} %", c.raw)),
            acidity: self.acidity(text).map(|v| format!("{v:.2} pH")),
            npk: self.npk.resolve(text),
            data_quality: data_quality(text),
        }
    }

    fn acidity(&self, text: &str) -> Option<f64> {
        if let Some(candidate) = first_match(&self.acidity, text) {
            return Some(candidate.value);
        }
        self.ph_labels.iter().find_map(|label| {
            search_near(text, label, &self.ph_number, PH_RADIUS, ph_in_range).map(|c| c.value)
        })
    }
}

/// Advisory only; individual fields are still extracted from a poor page.
pub fn data_quality(text: &str) -> DataQuality {
    let lower = text.to_lowercase();
    let indicators: usize = NO_DATA_MARKERS.iter().map(|m| count_ci(&lower, m)).sum();
    if indicators > NO_DATA_LIMIT {
        log::warn!("Data quality warning: {indicators} 'no data'/'field not found' indicators detected");
        DataQuality::PoorNoData
    } else {
        DataQuality::Good
    }
}
