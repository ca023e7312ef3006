use log::warn;
use serde::Deserialize;

use crate::metrics::MetricsRecord;

/// Physically plausible ranges. Temperature, moisture and EC bounds are
/// inclusive; pH must be above `0` and at most `ph_max`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ValidationLimits {
    pub temperature: (f64, f64),
    pub moisture: (f64, f64),
    pub ec: (f64, f64),
    pub ph_max: f64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            temperature: (-40.0, 60.0),
            moisture: (0.0, 100.0),
            ec: (0.0, 5000.0),
            ph_max: 14.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub issues: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityValidator {
    limits: ValidationLimits,
}

fn outside((lo, hi): (f64, f64), v: f64) -> bool {
    v < lo || v > hi
}

impl QualityValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn validate(&self, metrics: &MetricsRecord, source: &str) -> Validation {
        let limits = &self.limits;
        let mut issues = Vec::new();

        if let Some(t) = metrics.temperature_c.filter(|t| outside(limits.temperature, *t)) {
            issues.push(format!("Temperature {t}°C seems unrealistic"));
        }
        if let Some(m) = metrics.moisture_pct.filter(|m| outside(limits.moisture, *m)) {
            issues.push(format!("Moisture {m}% is out of range"));
        }
        if let Some(ec) = metrics.ec_us_cm.filter(|ec| outside(limits.ec, *ec)) {
            issues.push(format!("EC {ec} µS/cm seems extreme"));
        }
        if let Some(ph) = metrics.acidity_ph.filter(|ph| *ph <= 0.0 || *ph > limits.ph_max) {
            issues.push(format!("pH {ph} is out of valid range"));
        }

        if !issues.is_empty() {
            warn!("Validation warnings for {source}:");
            for issue in &issues {
                warn!("   - {issue}");
            }
        }
        Validation { issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(metrics: MetricsRecord) -> Validation {
        QualityValidator::default().validate(&metrics, "Sensor 1")
    }

    #[test]
    fn in_range_record_is_valid() {
        let v = validate(MetricsRecord {
            temperature_c: Some(-40.0),
            moisture_pct: Some(100.0),
            ec_us_cm: Some(0.0),
            acidity_ph: Some(14.0),
            ..MetricsRecord::default()
        });
        assert!(v.is_valid(), "{:?}", v.issues);
    }

    #[test]
    fn absent_values_are_never_flagged() {
        assert!(validate(MetricsRecord::default()).is_valid());
    }

    #[test]
    fn hot_reading_is_flagged_without_being_altered() {
        let metrics = MetricsRecord {
            temperature_c: Some(70.0),
            ..MetricsRecord::default()
        };
        let v = validate(metrics);
        assert!(!v.is_valid());
        assert_eq!(v.issues, vec!["Temperature 70°C seems unrealistic".to_string()]);
        assert_eq!(metrics.temperature_c, Some(70.0));
    }

    #[test]
    fn each_check_fires_independently() {
        let v = validate(MetricsRecord {
            moisture_pct: Some(-1.0),
            ec_us_cm: Some(5000.5),
            acidity_ph: Some(0.0),
            ..MetricsRecord::default()
        });
        assert_eq!(v.issues.len(), 3);
    }

    #[test]
    fn limits_can_be_tightened() {
        let validator = QualityValidator::new(ValidationLimits {
            temperature: (0.0, 30.0),
            ..ValidationLimits::default()
        });
        let v = validator.validate(
            &MetricsRecord {
                temperature_c: Some(31.0),
                ..MetricsRecord::default()
            },
            "Sensor 2",
        );
        assert!(!v.is_valid());
    }
}
