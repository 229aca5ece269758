//! ICON-D2 wind retrieval.
//!
//! Downloads the u/v/w model-level files of one ICON-D2 run from DWD open
//! data with a bounded number of simultaneous connections, then decodes
//! them with `grib_dump`, crops them to Germany and writes one stacked
//! binary file per field and forecast hour.

mod config;
mod download;
mod pipeline;
mod targets;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use grib_dump::GribDumpDecoder;
use ingestion::IncompleteHourPolicy;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::{HourRange, LevelRange, RunConfig};
use download::HttpTransport;
use pipeline::Pipeline;
use targets::RunTime;

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "Download and stack ICON-D2 model-level wind fields")]
struct Args {
    /// Output directory; files land in <output>/<YYYYMMDDHH>/<field>/
    #[arg(short, long)]
    output: PathBuf,

    /// Run configuration file (optional)
    #[arg(long, env = "ICON_WIND_CONFIG", default_value = "config/icon-d2.yaml")]
    config: PathBuf,

    /// Forecast hours, both ends included
    #[arg(short = 'n', long, num_args = 2, value_names = ["START", "STOP"])]
    hours: Option<Vec<u32>>,

    /// Model levels, end excluded
    #[arg(long, num_args = 2, value_names = ["START", "STOP"])]
    levels: Option<Vec<u32>>,

    /// Fields to retrieve
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Use the newest run instead of the one three hours earlier
    #[arg(long)]
    latest: bool,

    /// Explicit run time (YYYYMMDDHH) instead of one derived from the clock
    #[arg(long)]
    run: Option<RunTime>,

    /// Maximum concurrent downloads
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Write hours with missing levels from the levels that succeeded
    #[arg(long)]
    partial: bool,

    /// Delete archives and GRIB files once an hour is stacked
    #[arg(long)]
    cleanup: bool,

    /// Decoder executable
    #[arg(long, env = "GRIB_DUMP")]
    decoder: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Apply command-line overrides on top of the file configuration.
    fn apply(&self, mut config: RunConfig) -> RunConfig {
        if let Some([start, stop]) = self.hours.as_deref() {
            config.hours = HourRange {
                start: *start,
                stop: *stop,
            };
        }
        if let Some([start, stop]) = self.levels.as_deref() {
            config.levels = LevelRange {
                start: *start,
                stop: *stop,
            };
        }
        if let Some(fields) = &self.fields {
            config.fields = fields.clone();
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = max;
        }
        if let Some(decoder) = &self.decoder {
            config.decoder = decoder.clone();
        }
        config.latest |= self.latest;
        config.remove_intermediate |= self.cleanup;
        if self.partial {
            config.incomplete_hour = IncompleteHourPolicy::WritePartial;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let config = args.apply(RunConfig::load_or_default(&args.config)?);
    config.validate()?;

    let run = args
        .run
        .unwrap_or_else(|| RunTime::at(Utc::now(), config.latest));
    info!(
        run = %run,
        fields = ?config.fields,
        hours = ?config.hours.range(),
        levels = ?config.levels.range(),
        max_concurrent = config.max_concurrent,
        "Starting ICON-D2 retrieval"
    );

    // Fail before downloading gigabytes that could not be decoded.
    let decoder = GribDumpDecoder::with_program(&config.decoder);
    if let Err(e) = decoder.probe() {
        error!(error = %e, "Decoder unavailable");
        return Err(e.into());
    }

    let transport = HttpTransport::new(config.request_timeout())?;
    let pipeline = Pipeline::new(config, args.output.clone(), transport, decoder);
    let summary = pipeline.run(run).await?;

    for hour in summary.hours.iter().filter(|h| !h.is_complete()) {
        warn!(
            field = %hour.field,
            hour = hour.hour,
            failed_levels = ?hour.failed.iter().map(|f| f.level).collect::<Vec<_>>(),
            written = hour.artifact.is_some(),
            write_error = hour.write_error.as_deref(),
            "Incomplete hour"
        );
    }
    info!(
        downloaded = summary.downloaded,
        failed_downloads = summary.failed_downloads,
        artifacts = summary.artifacts().count(),
        incomplete_hours = summary.incomplete_hours(),
        "Retrieval finished"
    );

    Ok(())
}
