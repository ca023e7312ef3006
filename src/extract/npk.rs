use std::fmt;

use log::{debug, info, warn};
use regex::Regex;

use super::rules::{first_match, search_near, Rule, DECIMAL};
use crate::structures::errors::SoilwatchError;

const LABEL_RADIUS: usize = 80;
const UNITS: &str = r"(?:mg/kg|ppm|mg/L)";

/// Reported unit. The source labels the values `mg/L`; they are soil
/// concentrations by mass and are relabelled without conversion.
pub const NUTRIENT_UNIT: &str = "mg/kg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nutrient {
    Nitrogen,
    Phosphorus,
    Potassium,
}

impl Nutrient {
    pub const ALL: [Nutrient; 3] = [Nutrient::Nitrogen, Nutrient::Phosphorus, Nutrient::Potassium];

    pub fn label(self) -> &'static str {
        match self {
            Nutrient::Nitrogen => "Nitrogen",
            Nutrient::Phosphorus => "Phosphorus",
            Nutrient::Potassium => "Potassium",
        }
    }

    /// Panel identifier used by the dashboard's query editor.
    fn identifier(self) -> &'static str {
        match self {
            Nutrient::Nitrogen => "i_nitrogen",
            Nutrient::Phosphorus => "j_phosphorus",
            Nutrient::Potassium => "k_potassium",
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn nutrient_in_range(v: f64) -> bool {
    v > 0.0 && v < 10_000.0
}

/// Display strings (`"<value> mg/kg"`) for each nutrient that was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Npk {
    pub nitrogen: Option<String>,
    pub phosphorus: Option<String>,
    pub potassium: Option<String>,
}

impl Npk {
    pub fn get(&self, nutrient: Nutrient) -> Option<&str> {
        match nutrient {
            Nutrient::Nitrogen => self.nitrogen.as_deref(),
            Nutrient::Phosphorus => self.phosphorus.as_deref(),
            Nutrient::Potassium => self.potassium.as_deref(),
        }
    }

    fn slot(&mut self, nutrient: Nutrient) -> &mut Option<String> {
        match nutrient {
            Nutrient::Nitrogen => &mut self.nitrogen,
            Nutrient::Phosphorus => &mut self.phosphorus,
            Nutrient::Potassium => &mut self.potassium,
        }
    }

    pub fn is_complete(&self) -> bool {
        Nutrient::ALL.iter().all(|n| self.get(*n).is_some())
    }
}

#[derive(Debug, Clone)]
struct LabelSearch {
    nutrient: Nutrient,
    rules: Vec<Rule>,
    labels: Regex,
}

impl LabelSearch {
    fn new(nutrient: Nutrient) -> Result<Self, SoilwatchError> {
        let label = nutrient.label();
        let upper = label.to_uppercase();
        let ident = nutrient.identifier();
        let rules = vec![
            Rule::bounded(
                "label",
                &format!(r"\b{label}\b[:\s]*({DECIMAL})\s*{UNITS}?"),
                nutrient_in_range,
            )?,
            Rule::bounded("upper label", &format!(r"{upper}[:\s]*({DECIMAL})"), nutrient_in_range)?,
            Rule::bounded(
                "identifier",
                &format!(r"{ident}.*?({DECIMAL})\s*{UNITS}"),
                nutrient_in_range,
            )?,
            Rule::bounded(
                "trailing label",
                &format!(r"({DECIMAL})\s*{UNITS}?\s*{label}"),
                nutrient_in_range,
            )?,
        ];
        Ok(Self {
            nutrient,
            rules,
            labels: Regex::new(&format!("(?i){ident}|{label}|{upper}"))?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NpkDisambiguator {
    section_start: Regex,
    section_end: Regex,
    mg_per_litre: Regex,
    searches: Vec<LabelSearch>,
}

impl NpkDisambiguator {
    pub fn new() -> Result<Self, SoilwatchError> {
        Ok(Self {
            section_start: Regex::new("(?i)GROWING PARAMETERS")?,
            section_end: Regex::new("(?i)TEMPERATURE")?,
            mg_per_litre: Regex::new(&format!(r"(?i)({DECIMAL})\s*mg/L"))?,
            searches: Nutrient::ALL
                .into_iter()
                .map(LabelSearch::new)
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn resolve(&self, text: &str) -> Npk {
        let mut npk = Npk::default();

        if let Some(section) = self.section(text) {
            let values: Vec<&str> = self
                .mg_per_litre
                .captures_iter(section)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
                .collect();
            debug!("NPK section holds {} mg/L value(s): {:?}", values.len(), values);
            assign_by_position(&mut npk, &values);
        }

        for search in &self.searches {
            let slot = npk.slot(search.nutrient);
            if slot.is_some() {
                continue;
            }
            let found = first_match(&search.rules, text).or_else(|| {
                search_near(text, &search.labels, &self.mg_per_litre, LABEL_RADIUS, nutrient_in_range)
            });
            if let Some(candidate) = found {
                debug!("{} recovered by label search: {}", search.nutrient, candidate.raw);
                *slot = Some(format!("{:?} {NUTRIENT_UNIT}", candidate.value));
            }
        }

        npk
    }

    /// Text from the first GROWING PARAMETERS marker up to the next
    /// TEMPERATURE marker, or to the end of the text.
    fn section<'t>(&self, text: &'t str) -> Option<&'t str> {
        let start = self.section_start.find(text)?;
        let end = self
            .section_end
            .find_at(text, start.end())
            .map_or(text.len(), |m| m.start());
        Some(&text[start.start()..end])
    }
}

/// Observed layout order is N, K, P: the first value belongs to nitrogen,
/// the second to potassium, the third to phosphorus. This follows the live
/// dashboard and nothing downstream can detect a plausible but wrong mapping.
fn assign_by_position(npk: &mut Npk, values: &[&str]) {
    match values {
        [n, k, p, ..] => {
            npk.nitrogen = Some(format_nutrient(n));
            npk.potassium = Some(format_nutrient(k));
            npk.phosphorus = Some(format_nutrient(p));
            info!("NPK extracted: N={n}, K={k}, P={p}");
        }
        [n, p] => {
            npk.nitrogen = Some(format_nutrient(n));
            npk.phosphorus = Some(format_nutrient(p));
            info!("Only 2 NPK values found");
        }
        [n] => {
            npk.nitrogen = Some(format_nutrient(n));
            warn!("Only 1 NPK value found");
        }
        [] => warn!("No NPK values found in GROWING PARAMETERS section"),
    }
}

fn format_nutrient(raw: &str) -> String {
    format!("{raw} {NUTRIENT_UNIT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(text: &str) -> Npk {
        NpkDisambiguator::new().unwrap().resolve(text)
    }

    #[test]
    fn three_values_map_n_k_p() {
        let npk = resolve("GROWING PARAMETERS N K 10 mg/L 20 mg/L 30 mg/L P TEMPERATURE 21 °C");
        assert_eq!(npk.nitrogen.as_deref(), Some("10 mg/kg"));
        assert_eq!(npk.potassium.as_deref(), Some("20 mg/kg"));
        assert_eq!(npk.phosphorus.as_deref(), Some("30 mg/kg"));
    }

    #[test]
    fn two_values_map_nitrogen_then_phosphorus() {
        let npk = resolve("GROWING PARAMETERS 11 mg/L 22 mg/L TEMPERATURE");
        assert_eq!(npk.nitrogen.as_deref(), Some("11 mg/kg"));
        assert_eq!(npk.phosphorus.as_deref(), Some("22 mg/kg"));
        assert_eq!(npk.potassium, None);
    }

    #[test]
    fn single_value_is_nitrogen_and_others_fall_back_to_labels() {
        let npk = resolve("GROWING PARAMETERS 5 mg/L TEMPERATURE\nPotassium: 40 mg/kg");
        assert_eq!(npk.nitrogen.as_deref(), Some("5 mg/kg"));
        assert_eq!(npk.potassium.as_deref(), Some("40.0 mg/kg"));
        assert_eq!(npk.phosphorus, None);
    }

    #[test]
    fn values_after_temperature_marker_are_not_positional() {
        let npk = resolve("GROWING PARAMETERS N K P TEMPERATURE 10 mg/L 20 mg/L 30 mg/L");
        // the section is empty, so only label searches can fill the slots
        assert_eq!(npk, Npk::default());
    }

    #[test]
    fn label_rule_rejects_out_of_range_values() {
        let npk = resolve("Nitrogen: 0 ppm\n7 mg/kg Nitrogen");
        assert_eq!(npk.nitrogen.as_deref(), Some("7.0 mg/kg"));
    }

    #[test]
    fn identifier_label_is_searched() {
        let npk = resolve("query j_phosphorus result 14.5 mg/L");
        assert_eq!(npk.phosphorus.as_deref(), Some("14.5 mg/kg"));
    }

    #[test]
    fn window_search_finds_nearby_mg_per_litre_value() {
        // no rule matches: the number precedes the label with other words between
        let npk = resolve("33 mg/L reading for soil potassium sensor");
        assert_eq!(npk.potassium.as_deref(), Some("33.0 mg/kg"));
    }
}
