use std::{fs, time::Duration};

use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::{Parser, Subcommand};
use log::{info, warn};
use reqwest::Client;
use time::UtcOffset;

use soilwatch::{
    api,
    fetch::{HttpFetcher, PageFetcher},
    recorder::{report, Pipeline, Recorder},
    store::ReadingLog,
    structures::{config::Config, errors::SoilwatchError},
    validate::ValidationLimits,
};

#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// path to config file
    #[arg(long, env, default_value = "./config.yaml")]
    config_path: String,

    /// path to the reading history CSV
    #[arg(long, env, default_value = "readings_history.csv")]
    history_path: String,

    /// minutes between poll cycles
    #[arg(long, short = 'i', env, default_value_t = 10)]
    poll_interval_minutes: u64,

    /// stop polling after this many minutes (testing only)
    #[arg(long, short = 'd', env)]
    duration_minutes: Option<u64>,

    #[arg(long, env, default_value = "0.0.0.0")]
    bind_address: String,

    #[arg(long, env, default_value_t = 5000)]
    port: u16,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the dashboard API and poll in the background (default)
    Serve,
    /// Poll on the configured interval without serving
    Watch,
    /// Run a single poll cycle and exit
    Check,
    /// Save the raw page text of one source for inspection
    Capture {
        #[arg(long)]
        source: String,
        #[arg(long)]
        output: Option<String>,
    },
    /// Run extraction over a saved page text dump without recording it
    Extract {
        file: String,
        #[arg(long, default_value = "capture")]
        sensor: String,
    },
}

fn capture_file_name(source: &str) -> String {
    format!("debug_{}_raw.txt", source.replace(' ', "_").to_lowercase())
}

fn minutes(value: u64, what: &str) -> Result<Duration, SoilwatchError> {
    value
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| SoilwatchError::Config(format!("{what} of {value} minutes is too large")))
}

fn setup(args: &Args) -> Result<(Config, HttpFetcher, ReadingLog), SoilwatchError> {
    info!("Reading config from {}", args.config_path);
    let config = Config::from_path(&args.config_path)?;
    Ok((
        config,
        HttpFetcher::new(Client::new()),
        ReadingLog::new(&args.history_path),
    ))
}


#[actix_web::main]
async fn main() -> Result<(), SoilwatchError> {
    // Must be read while this is still the only thread.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let mut args = Args::parse();
    info!("Started with args: {:?}", args);

    if args.poll_interval_minutes == 0 {
        return Err(SoilwatchError::Config(
            "poll interval must be at least one minute".into(),
        ));
    }
    let interval = minutes(args.poll_interval_minutes, "poll interval")?;
    let duration = args
        .duration_minutes
        .map(|m| minutes(m, "run duration"))
        .transpose()?;

    let command = args.command.take().unwrap_or(Command::Serve);
    match command {
        Command::Extract { file, sensor } => {
            let text = fs::read_to_string(&file)?;
            let reading = Pipeline::new(ValidationLimits::default())?.run(&sensor, &text);
            report(&sensor, &reading);
        }
        Command::Capture { source, output } => {
            let (config, fetcher, _) = setup(&args)?;
            let source = config
                .source(&source)
                .ok_or_else(|| SoilwatchError::Config(format!("unknown source '{source}'")))?;
            let text = fetcher.fetch(&source.url).await?;
            let output = output.unwrap_or_else(|| capture_file_name(&source.name));
            fs::write(&output, &text)?;
            info!("Saved {} characters of {} to {}", text.chars().count(), source.name, output);
        }
        Command::Check => {
            let (config, fetcher, log) = setup(&args)?;
            let recorder = Recorder::new(fetcher, &config, log, offset)?;
            let summary = recorder.run_cycle().await;
            if summary.failed > 0 {
                warn!("{} of {} source(s) failed", summary.failed, recorder.sources().len());
            }
        }
        Command::Watch => {
            let (config, fetcher, log) = setup(&args)?;
            let recorder = Recorder::new(fetcher, &config, log, offset)?;
            recorder.watch(interval, duration).await;
        }
        Command::Serve => {
            let (config, fetcher, log) = setup(&args)?;
            let recorder = Recorder::new(fetcher, &config, log.clone(), offset)?;
            actix_web::rt::spawn(async move {
                recorder.watch(interval, duration).await;
            });

            info!("Serving on {}:{}", args.bind_address, args.port);
            HttpServer::new(move || {
                App::new()
                    .wrap(Logger::default())
                    .app_data(web::Data::new(log.clone()))
                    .configure(api::configure)
            })
            .bind((args.bind_address.as_str(), args.port))?
            .run()
            .await?;
        }
    }
    Ok(())
}
