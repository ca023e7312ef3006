use std::collections::BTreeMap;

use actix_web::{get, web, HttpResponse};
use askama::Template;
use log::debug;

use crate::{
    store::ReadingLog,
    structures::{
        errors::SoilwatchError,
        model::{ReadingRow, Status, ABSENT},
    },
};

#[derive(Debug)]
struct SensorCard {
    sensor: String,
    timestamp: String,
    overall: Status,
    values: Vec<(&'static str, String)>,
}

impl SensorCard {
    fn critical(&self) -> bool {
        self.overall == Status::Critical
    }
}

fn cell(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) if unit.is_empty() => v.to_string(),
        Some(v) => format!("{v} {unit}"),
        None => ABSENT.to_string(),
    }
}

impl From<&ReadingRow> for SensorCard {
    fn from(row: &ReadingRow) -> Self {
        Self {
            sensor: row.sensor.clone(),
            timestamp: row.timestamp_iso.clone(),
            overall: row.overall_status,
            values: vec![
                ("Temperature", cell(row.temperature_c, "°C")),
                ("Moisture", cell(row.moisture_pct, "%")),
                ("Electric Conductivity", cell(row.ec_us_cm, "µS/cm")),
                ("pH", cell(row.ph, "")),
                ("Nitrogen", cell(row.nitrogen, "mg/kg")),
                ("Phosphorus", cell(row.phosphorus, "mg/kg")),
                ("Potassium", cell(row.potassium, "mg/kg")),
            ],
        }
    }
}

#[derive(Debug, Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    cards: Vec<SensorCard>,
}

async fn latest(log: web::Data<ReadingLog>) -> Result<BTreeMap<String, ReadingRow>, SoilwatchError> {
    let log = log.into_inner();
    web::block(move || log.latest()).await?
}

#[get("/")]
pub async fn index_handler(log: web::Data<ReadingLog>) -> Result<HttpResponse, SoilwatchError> {
    let latest = latest(log).await?;
    let index = IndexTemplate {
        cards: latest.values().map(SensorCard::from).collect(),
    };
    Ok(HttpResponse::Ok()
        .content_type("text/html")
        .body(index.render()?))
}

#[get("/api/latest")]
pub async fn latest_handler(log: web::Data<ReadingLog>) -> Result<HttpResponse, SoilwatchError> {
    let latest = latest(log).await?;
    debug!("serving latest readings for {} sensor(s)", latest.len());
    Ok(HttpResponse::Ok().json(latest))
}

#[get("/api/history")]
pub async fn history_handler(log: web::Data<ReadingLog>) -> Result<HttpResponse, SoilwatchError> {
    let log = log.into_inner();
    let rows = web::block(move || log.read_all()).await??;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/history/{sensor}")]
pub async fn sensor_history_handler(
    log: web::Data<ReadingLog>,
    sensor: web::Path<String>,
) -> Result<HttpResponse, SoilwatchError> {
    let log = log.into_inner();
    let sensor = sensor.into_inner();
    let rows = web::block(move || log.history_for(&sensor)).await??;
    Ok(HttpResponse::Ok().json(rows))
}

/// Register every route on an app or scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index_handler)
        .service(latest_handler)
        .service(history_handler)
        .service(sensor_history_handler);
}
