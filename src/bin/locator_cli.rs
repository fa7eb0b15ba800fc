use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use locator_ai::config::AppConfig;
use locator_ai::engine::SensorReading;
use locator_ai::error::ClassifyError;
use locator_ai::managers::{ExpiringInstanceCache, InstanceManager};
use locator_ai::telemetry::TelemetryCollector;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "locator_cli",
    about = "Train and query ensemble location classifiers"
)]
struct Cli {
    /// JSON config file (defaults apply for anything missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the folder holding persisted model files
    #[arg(long, global = true)]
    data_folder: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train every classifier family from a calibration CSV
    Train {
        #[arg(long)]
        family: String,
        #[arg(long)]
        csv: PathBuf,
        /// Fix the RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Print per-family diagnostics as JSON lines
        #[arg(long)]
        diagnostics: bool,
    },
    /// Classify a request (`{"f": family, "s": {...}}`) from a file or `-`
    Classify {
        #[arg(long)]
        request: String,
    },
    /// Show what a persisted family contains
    Inspect {
        #[arg(long)]
        family: String,
    },
}

#[derive(Serialize)]
struct TrainSummary<'a> {
    family: &'a str,
    path: String,
    locations: usize,
    sensors: usize,
    trained: Vec<&'static str>,
    failed: Vec<(&'static str, String)>,
    elapsed_ms: u64,
}

#[derive(Serialize)]
struct InspectSummary<'a> {
    family: &'a str,
    header: &'a [String],
    locations: Vec<(usize, &'a str)>,
    trained: Vec<&'static str>,
}

fn main() -> ExitCode {
    locator_ai::init_logging("info");
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };
    if let Some(folder) = cli.data_folder {
        config.store.data_folder = folder;
    }

    match cli.command {
        Commands::Train {
            family,
            csv,
            seed,
            diagnostics,
        } => {
            if seed.is_some() {
                config.training.seed = seed;
            }
            run_train(config, &family, csv, diagnostics)
        }
        Commands::Classify { request } => run_classify(config, &request),
        Commands::Inspect { family } => run_inspect(config, &family),
    }
}

fn run_train(config: AppConfig, family: &str, csv: PathBuf, diagnostics: bool) -> Result<ExitCode> {
    let telemetry = Arc::new(TelemetryCollector::default());
    let cache = Arc::new(ExpiringInstanceCache::from_config(&config.cache));
    let manager = InstanceManager::new(config, cache, Some(Arc::clone(&telemetry)));

    let outcome = manager
        .learn(family, &csv)
        .with_context(|| format!("training '{}' from {}", family, csv.display()))?;

    if diagnostics {
        for entry in &outcome.diagnostics {
            println!("{}", serde_json::to_string(entry)?);
        }
    }

    let summary = TrainSummary {
        family,
        path: outcome.path.display().to_string(),
        locations: outcome.instance.registry.len(),
        sensors: outcome.instance.header.width(),
        trained: outcome.instance.trained_families(),
        failed: outcome
            .failures
            .iter()
            .map(|(f, err)| (f.name(), err.to_string()))
            .collect(),
        elapsed_ms: outcome.elapsed.as_millis() as u64,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::from(0))
}

fn run_classify(config: AppConfig, request: &str) -> Result<ExitCode> {
    let raw = if request == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("reading request from stdin")?;
        buf
    } else {
        fs::read_to_string(request).with_context(|| format!("reading request {}", request))?
    };
    let reading: SensorReading = serde_json::from_str(&raw).context("parsing classification request")?;

    let manager = InstanceManager::with_default_cache(config);
    match manager.classify(&reading) {
        Ok(result) => {
            println!("{}", serde_json::to_string(&result)?);
            Ok(ExitCode::from(0))
        }
        Err(err @ ClassifyError::ModelNotFound { .. }) => {
            eprintln!("{}", err);
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err).context("classifying request"),
    }
}

fn run_inspect(config: AppConfig, family: &str) -> Result<ExitCode> {
    let manager = InstanceManager::with_default_cache(config);
    let instance = match manager.instance(family) {
        Ok(instance) => instance,
        Err(err @ ClassifyError::ModelNotFound { .. }) => {
            eprintln!("{}", err);
            return Ok(ExitCode::from(2));
        }
        Err(err) => return Err(err).context("loading instance"),
    };

    let summary = InspectSummary {
        family,
        header: instance.header.columns(),
        locations: instance.registry.iter().collect(),
        trained: instance.trained_families(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::from(0))
}
