use std::{
    panic::AssertUnwindSafe,
    time::{Duration, Instant},
};

use actix_web::{rt::time::sleep, web};
use futures::{stream, FutureExt, StreamExt};
use log::{error, info, warn};
use time::{macros::format_description, OffsetDateTime, UtcOffset};

use crate::{
    extract::{Field, FieldExtractor, FieldResult, NOT_AVAILABLE},
    fetch::PageFetcher,
    metrics::{MetricsBuilder, MetricsRecord},
    store::ReadingLog,
    structures::{
        config::{Config, Source, StatusThresholds},
        errors::SoilwatchError,
        model::ReadingRow,
    },
    validate::{QualityValidator, Validation, ValidationLimits},
};

/// Everything derived from one page of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub fields: FieldResult,
    pub metrics: MetricsRecord,
    pub validation: Validation,
}

/// The pure part of a poll: text in, validated metrics out.
#[derive(Debug, Clone)]
pub struct Pipeline {
    extractor: FieldExtractor,
    builder: MetricsBuilder,
    validator: QualityValidator,
}

impl Pipeline {
    pub fn new(limits: ValidationLimits) -> Result<Self, SoilwatchError> {
        Ok(Self {
            extractor: FieldExtractor::new()?,
            builder: MetricsBuilder::new()?,
            validator: QualityValidator::new(limits),
        })
    }

    pub fn run(&self, source: &str, text: &str) -> Reading {
        let fields = self.extractor.extract(text);
        let metrics = self.builder.build(&fields);
        let validation = self.validator.validate(&metrics, source);
        Reading {
            fields,
            metrics,
            validation,
        }
    }
}

/// Log a per-source summary of what was extracted.
pub fn report(source: &str, reading: &Reading) {
    let fields = &reading.fields;
    info!("---- {source} ----");
    info!("Data Quality: {}", fields.data_quality);
    for (field, value) in fields.iter() {
        info!("{:25}: {}", field.label(), value.unwrap_or(NOT_AVAILABLE));
    }

    let npk = if fields.npk.is_complete() { "complete" } else { "incomplete" };
    info!("NPK status ({npk}):");
    for field in [Field::Nitrogen, Field::Phosphorus, Field::Potassium] {
        info!("   {:11}: {}", field.label(), fields.display(field));
    }

    info!("Parsed numeric values:");
    for (metric, value) in reading.metrics.iter() {
        match value {
            Some(v) => info!("   {:23}: {}", metric.name(), v),
            None => info!("   {:23}: missing", metric.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub recorded: usize,
    pub failed: usize,
}

pub struct Recorder<F> {
    fetcher: F,
    pipeline: Pipeline,
    log: ReadingLog,
    sources: Vec<Source>,
    thresholds: StatusThresholds,
    offset: UtcOffset,
}

impl<F: PageFetcher> Recorder<F> {
    pub fn new(
        fetcher: F,
        config: &Config,
        log: ReadingLog,
        offset: UtcOffset,
    ) -> Result<Self, SoilwatchError> {
        Ok(Self {
            fetcher,
            pipeline: Pipeline::new(config.limits)?,
            log,
            sources: config.sources.clone(),
            thresholds: config.status,
            offset,
        })
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn log(&self) -> &ReadingLog {
        &self.log
    }

    /// Process one source and append its row to the log.
    pub async fn record_source(&self, source: &Source) -> Result<ReadingRow, SoilwatchError> {
        let text = self.fetcher.fetch(&source.url).await?;
        let reading = self.pipeline.run(&source.name, &text);
        report(&source.name, &reading);

        let row = ReadingRow::new(
            self.timestamp()?,
            &source.name,
            &reading.metrics,
            &self.thresholds,
        );
        let log = self.log.clone();
        let written = row.clone();
        web::block(move || log.append(&written)).await??;
        if reading.validation.is_valid() {
            info!("Saved {} reading to {}", source.name, self.log.path().display());
        } else {
            warn!(
                "Saved {} reading to {} with {} validation warning(s)",
                source.name,
                self.log.path().display(),
                reading.validation.issues.len()
            );
        }
        Ok(row)
    }

    /// One pass over every source, in configuration order. A source that
    /// errors or panics is counted as failed and the pass moves on.
    pub async fn run_cycle(&self) -> CycleSummary {
        stream::iter(&self.sources)
            .then(|source| async move {
                match AssertUnwindSafe(self.record_source(source)).catch_unwind().await {
                    Ok(Ok(_)) => true,
                    Ok(Err(e)) => {
                        error!("Failed to record {}: {}", source.name, e);
                        false
                    }
                    Err(_) => {
                        error!("Recording {} aborted unexpectedly", source.name);
                        false
                    }
                }
            })
            .fold(CycleSummary::default(), |mut summary, ok| async move {
                if ok {
                    summary.recorded += 1;
                } else {
                    summary.failed += 1;
                }
                summary
            })
            .await
    }

    /// Poll every `interval` until `duration` has elapsed, or forever when no
    /// duration is given. Returns the number of cycles run.
    pub async fn watch(&self, interval: Duration, duration: Option<Duration>) -> u64 {
        let started = Instant::now();
        let mut runs = 0;

        info!("Starting poll loop, interval {:?}", interval);
        match duration {
            Some(d) => info!("Bounded run: stopping after {:?}", d),
            None => info!("Running until the process is stopped"),
        }

        loop {
            if duration.is_some_and(|d| started.elapsed() >= d) {
                info!("Run duration completed ({runs} cycle(s))");
                break;
            }

            runs += 1;
            info!("Run #{runs}");
            let summary = self.run_cycle().await;
            info!(
                "Cycle #{runs} done: {} recorded, {} failed",
                summary.recorded, summary.failed
            );

            let pause = match duration {
                Some(d) => interval.min(d.saturating_sub(started.elapsed())),
                None => interval,
            };
            info!("Sleeping for {:?}", pause);
            sleep(pause).await;
        }
        runs
    }

    fn timestamp(&self) -> Result<String, SoilwatchError> {
        let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        Ok(OffsetDateTime::now_utc().to_offset(self.offset).format(format)?)
    }
}
