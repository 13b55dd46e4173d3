//! Steps CLI - Command-line interface for Synheart Steps
//!
//! Commands:
//! - replay: Drive the engine with recorded accelerometer samples
//! - analyze: Compute display projections for a stored daily record
//! - doctor: Diagnose configuration and store health

use chrono::{Duration, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use synheart_steps::analytics;
use synheart_steps::{
    AccelSample, Clock, DailyStepRecord, DerivedSnapshot, FileStore, HostSensor, KeyValueStore,
    ManualClock, MemoryStore, StepConfig, StepEngine, StepError, StepReportEncoder, SystemClock,
    PRODUCER_NAME, STEPS_VERSION,
};

/// Steps - On-device step detection and daily activity aggregation
#[derive(Parser)]
#[command(name = "steps")]
#[command(author = "Synheart AI Inc")]
#[command(version = STEPS_VERSION)]
#[command(about = "Count steps from accelerometer samples", long_about = None)]
struct Cli {
    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay NDJSON accelerometer samples through the engine
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Wall-clock time of the first sample (YYYY-MM-DDTHH:MM:SS, local)
        #[arg(long)]
        start: Option<String>,

        /// Spacing between samples without a t_ms field
        #[arg(long, default_value = "20")]
        interval_ms: i64,

        /// Persist the daily record under this directory
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Engine configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Compute sparkline, trend, and activity bars for a stored record
    Analyze {
        /// Record file path (use - for stdin)
        #[arg(short, long)]
        record: PathBuf,

        /// Local hour to evaluate at (defaults to the current hour)
        #[arg(long)]
        hour: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and store health
    Doctor {
        /// Store directory to inspect
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Engine configuration JSON to validate
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Full step report
    Json,
    /// One-line summary
    Summary,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), StepsCliError> {
    match cli.command {
        Commands::Replay {
            input,
            start,
            interval_ms,
            store_dir,
            config,
            output_format,
        } => cmd_replay(
            &input,
            start.as_deref(),
            interval_ms,
            store_dir.as_deref(),
            config.as_deref(),
            output_format,
        ),

        Commands::Analyze { record, hour, json } => cmd_analyze(&record, hour, json),

        Commands::Doctor {
            store_dir,
            config,
            json,
        } => cmd_doctor(store_dir.as_deref(), config.as_deref(), json),
    }
}

/// One NDJSON input line
#[derive(serde::Deserialize)]
struct SampleLine {
    x: f64,
    y: f64,
    z: f64,
    /// Offset from the replay start; samples without it are spaced evenly
    #[serde(default)]
    t_ms: Option<i64>,
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>, StepsCliError> {
    if path.to_string_lossy() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(fs::File::open(path)?)))
    }
}

fn read_text(path: &Path) -> Result<String, StepsCliError> {
    let mut buffer = String::new();
    open_input(path)?.read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn load_config(path: Option<&Path>) -> Result<StepConfig, StepsCliError> {
    match path {
        Some(path) => Ok(StepConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(StepConfig::default()),
    }
}

fn parse_start(start: Option<&str>) -> Result<NaiveDateTime, StepsCliError> {
    let Some(raw) = start else {
        return Ok(SystemClock.now());
    };
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| StepsCliError::InvalidArgument(format!("--start {raw:?}: {e}")))
}

fn cmd_replay(
    input: &Path,
    start: Option<&str>,
    interval_ms: i64,
    store_dir: Option<&Path>,
    config: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), StepsCliError> {
    if interval_ms <= 0 {
        return Err(StepsCliError::InvalidArgument(
            "--interval-ms must be positive".to_string(),
        ));
    }
    let config = load_config(config)?;
    let start = parse_start(start)?;
    let clock = ManualClock::new(start);

    let store: Arc<dyn KeyValueStore> = match store_dir {
        Some(dir) => Arc::new(FileStore::open(dir)?),
        None => Arc::new(MemoryStore::new()),
    };

    let mut engine = StepEngine::new(
        config,
        Box::new(HostSensor::available()),
        store,
        Arc::new(clock.clone()),
    )?;
    engine.start();

    let mut samples = 0usize;
    let mut steps = 0usize;
    for (index, line) in open_input(input)?.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: SampleLine = serde_json::from_str(line).map_err(|e| {
            StepsCliError::InvalidSample {
                line: index + 1,
                message: e.to_string(),
            }
        })?;

        if let Some(offset) = parsed.t_ms {
            clock.set(start + Duration::milliseconds(offset));
        }
        if engine.on_sample(AccelSample::new(parsed.x, parsed.y, parsed.z)).is_some() {
            steps += 1;
        }
        if parsed.t_ms.is_none() {
            clock.advance_ms(interval_ms);
        }
        samples += 1;
    }

    if samples == 0 {
        return Err(StepsCliError::NoSamples);
    }

    let snapshot = engine.refresh();
    let skipped = engine.skipped_samples();
    engine.stop();
    tracing::info!(samples, steps, skipped, "replay finished");

    match output_format {
        OutputFormat::Json => {
            let encoder = StepReportEncoder::new();
            println!("{}", encoder.encode_to_json(&snapshot)?);
        }
        OutputFormat::Summary => {
            println!(
                "{} samples, {} steps detected, {} skipped, {} total for {} (trend {:+}%)",
                samples,
                steps,
                skipped,
                snapshot.state.total_steps,
                snapshot.date,
                snapshot.derived.trend_percent
            );
        }
    }
    Ok(())
}

fn cmd_analyze(record: &Path, hour: Option<usize>, json: bool) -> Result<(), StepsCliError> {
    let record = DailyStepRecord::from_json(&read_text(record)?)?;
    let hour = hour.unwrap_or_else(|| SystemClock.current_hour());
    if hour >= 24 {
        return Err(StepsCliError::InvalidArgument(format!(
            "--hour must be 0-23, got {hour}"
        )));
    }

    let derived = DerivedSnapshot::compute(&record, hour);

    if json {
        println!("{}", serde_json::to_string_pretty(&derived)?);
    } else {
        println!("Date:      {}", record.date());
        println!("Total:     {}", record.total_steps());
        println!("Hour:      {}", hour);
        println!("Sparkline: {:?}", analytics::sparkline(record.hourly_buckets()));
        println!("Trend:     {:+}%", derived.trend_percent);
        let bars: Vec<String> = derived
            .activity_bars
            .iter()
            .map(|b| format!("{}{}", b.level, if b.active { "*" } else { "" }))
            .collect();
        println!("Bars:      [{}]", bars.join(", "));
    }
    Ok(())
}

fn cmd_doctor(
    store_dir: Option<&Path>,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), StepsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "steps_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Steps version {}", STEPS_VERSION),
    });

    let config = match config_path {
        Some(path) => match load_config(Some(path)) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid (threshold {}, refractory {} ms)",
                        config.detector.peak_threshold, config.detector.min_step_interval_ms
                    ),
                });
                config
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: CliError::from(e).message,
                });
                StepConfig::default()
            }
        },
        None => StepConfig::default(),
    };

    if let Some(dir) = store_dir {
        checks.push(check_store(dir, &config.persistence.storage_key));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STEPS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Steps Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StepsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_store(dir: &Path, key: &str) -> DoctorCheck {
    let check = |status, message| DoctorCheck {
        name: "store".to_string(),
        status,
        message,
    };

    let store = match FileStore::open(dir) {
        Ok(store) => store,
        Err(e) => return check(CheckStatus::Error, format!("Cannot open store: {e}")),
    };
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return check(CheckStatus::Warning, "No step record stored yet".to_string()),
        Err(e) => return check(CheckStatus::Error, format!("Cannot read step record: {e}")),
    };
    match DailyStepRecord::from_json(&raw) {
        Ok(record) if record.date() == SystemClock.today_key() => check(
            CheckStatus::Ok,
            format!("Today's record holds {} steps", record.total_steps()),
        ),
        Ok(record) => check(
            CheckStatus::Warning,
            format!(
                "Stored record is from {} and will be replaced on next start",
                record.date()
            ),
        ),
        Err(e) => check(
            CheckStatus::Error,
            format!("Stored record is corrupt and will be discarded: {e}"),
        ),
    }
}

// Error types

#[derive(Debug)]
enum StepsCliError {
    Io(io::Error),
    Engine(StepError),
    Json(serde_json::Error),
    InvalidSample { line: usize, message: String },
    InvalidArgument(String),
    NoSamples,
    DoctorFailed,
}

impl From<io::Error> for StepsCliError {
    fn from(e: io::Error) -> Self {
        StepsCliError::Io(e)
    }
}

impl From<StepError> for StepsCliError {
    fn from(e: StepError) -> Self {
        StepsCliError::Engine(e)
    }
}

impl From<serde_json::Error> for StepsCliError {
    fn from(e: serde_json::Error) -> Self {
        StepsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StepsCliError> for CliError {
    fn from(e: StepsCliError) -> Self {
        match e {
            StepsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StepsCliError::Engine(StepError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Fix the configuration value and retry".to_string()),
            },
            StepsCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'steps doctor' for details".to_string()),
            },
            StepsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StepsCliError::InvalidSample { line, message } => CliError {
                code: "SAMPLE_ERROR".to_string(),
                message: format!("line {line}: {message}"),
                hint: Some("Each line must be {\"x\":..,\"y\":..,\"z\":..} with optional \"t_ms\"".to_string()),
            },
            StepsCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: Some("Run 'steps --help' for usage".to_string()),
            },
            StepsCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            StepsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
