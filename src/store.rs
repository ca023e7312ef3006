use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, warn};

use crate::structures::{errors::SoilwatchError, model::ReadingRow};

#[derive(Debug, Clone)]
pub struct ReadingLog {
    path: PathBuf,
}

impl ReadingLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is new or empty.
    pub fn append(&self, row: &ReadingRow) -> Result<(), SoilwatchError> {
        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        debug!("appended reading for {} to {}", row.sensor, self.path.display());
        Ok(())
    }

    /// Every row in capture order. A missing file is an empty history.
    pub fn read_all(&self) -> Result<Vec<ReadingRow>, SoilwatchError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let parsed = record.and_then(|mut record| {
                // short rows: the missing trailing columns read as empty cells
                while record.len() < headers.len() {
                    record.push_field("");
                }
                record.deserialize::<ReadingRow>(Some(&headers))
            });
            match parsed {
                Ok(row) => rows.push(row),
                Err(e) => warn!("skipping unreadable row {} in {}: {}", i + 1, self.path.display(), e),
            }
        }
        Ok(rows)
    }

    /// Most recent row per sensor, last write wins.
    pub fn latest(&self) -> Result<BTreeMap<String, ReadingRow>, SoilwatchError> {
        Ok(latest_by_sensor(self.read_all()?))
    }

    pub fn history_for(&self, sensor: &str) -> Result<Vec<ReadingRow>, SoilwatchError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|row| row.sensor == sensor)
            .collect())
    }
}

pub fn latest_by_sensor(rows: Vec<ReadingRow>) -> BTreeMap<String, ReadingRow> {
    rows.into_iter()
        .map(|row| (row.sensor.clone(), row))
        .collect()
}
