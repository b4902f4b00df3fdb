// src/main.rs

mod annotation;
mod config;
mod counting;
mod error;
mod pipeline;
mod session;
mod summary;
mod types;
mod vehicle_detection;
mod video_processor;

use anyhow::{bail, Context, Result};
use clap::Parser;
use counting::object_counter::ObjectCounter;
use pipeline::{LogProgress, SessionOrchestrator};
use serde::Serialize;
use session::{ProcessingSession, SessionStore, Upload};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use summary::{summarize, VehicleSummary};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::Config;
use video_processor::VideoProcessor;

#[derive(Parser, Debug)]
#[command(
    name = "vehicle-counter",
    about = "Count vehicles crossing the midline of traffic videos"
)]
struct Args {
    /// YAML config (defaults to ./config.yaml if present)
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Print summaries as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Videos to process; every video under video.input_dir when omitted
    #[arg(value_name = "INPUT")]
    inputs: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    source: &'a str,
    output_path: Option<&'a Path>,
    summary: VehicleSummary,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vehicle_counter={},ort=warn", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_default(args.config.as_deref())?;
    init_logging(&config.logging.level);

    info!("🚗 Vehicle Counter Starting");
    if args.config.is_none() && !Path::new(config::DEFAULT_CONFIG_PATH).exists() {
        warn!(
            "No {} found, using built-in defaults",
            config::DEFAULT_CONFIG_PATH
        );
    }
    info!(
        "Model {} on {:?}, classes {:?}",
        config.counting.model_path, config.counting.device, config.counting.classes
    );

    let processor = VideoProcessor::new(config.video.clone());
    let inputs = if args.inputs.is_empty() {
        processor.find_video_files()?
    } else {
        args.inputs.clone()
    };

    if inputs.is_empty() {
        warn!("No video files found in {}, nothing to do", config.video.input_dir);
        return Ok(());
    }

    let counting_config = config.counting.clone();
    let mut orchestrator = SessionOrchestrator::new(
        processor,
        move || ObjectCounter::new(&counting_config),
        SessionStore::open(&config.session.state_file),
        &config.video.output_dir,
    );

    let cancel = orchestrator.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Ctrl+C received, stopping after the current frame");
        cancel.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let mut failures = 0;
    for (idx, path) in inputs.iter().enumerate() {
        info!("Video {}/{}: {}", idx + 1, inputs.len(), path.display());

        let upload = match Upload::from_path(path) {
            Ok(upload) => upload,
            Err(e) => {
                error!("{:#}", e);
                failures += 1;
                continue;
            }
        };

        let mut progress = LogProgress::default();
        match orchestrator.submit(&upload, &mut progress) {
            Ok(session) => print_report(&session, args.json)?,
            Err(e) => {
                error!("{} [{}]: {}", path.display(), e.kind(), e);
                failures += 1;
                if orchestrator.cancel_flag().load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} video(s) failed", failures, inputs.len());
    }

    info!("✓ All videos processed");
    Ok(())
}

fn print_report(session: &ProcessingSession, json: bool) -> Result<()> {
    if json {
        let report = Report {
            source: &session.source_name,
            output_path: session.output_path.as_deref(),
            summary: VehicleSummary::from_counts(&session.results),
        };
        let text = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{}", text);
        return Ok(());
    }

    println!("== {} ==", session.source_name);
    println!("{}", summarize(&session.results));
    if let Some(output) = &session.output_path {
        println!("Output video: {}", output.display());
    }
    println!();
    Ok(())
}
