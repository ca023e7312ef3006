use std::{collections::HashSet, fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::structures::errors::SoilwatchError;
use crate::validate::ValidationLimits;

/// One monitored dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    pub name: String,
    pub url: String,
}

/// Temperature band outside of which a reading is marked `CRITICAL`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StatusThresholds {
    pub temperature_critical_low: f64,
    pub temperature_critical_high: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            temperature_critical_low: 10.0,
            temperature_critical_high: 38.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub sources: Vec<Source>,
    #[serde(default)]
    pub status: StatusThresholds,
    #[serde(default)]
    pub limits: ValidationLimits,
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SoilwatchError> {
        let config: Config = serde_yaml::from_reader(BufReader::new(File::open(path)?))?;
        config.check()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, SoilwatchError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    fn check(&self) -> Result<(), SoilwatchError> {
        if self.sources.is_empty() {
            return Err(SoilwatchError::Config("no sources configured".into()));
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(SoilwatchError::Config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }
        let s = &self.status;
        if s.temperature_critical_low > s.temperature_critical_high {
            return Err(SoilwatchError::Config(
                "temperature_critical_low is above temperature_critical_high".into(),
            ));
        }
        Ok(())
    }
}
