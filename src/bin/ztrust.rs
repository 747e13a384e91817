//! ztrust - Command-line interface for Zerotrust Pulse
//!
//! Commands:
//! - replay: Replay a recorded signal trace and emit one record per evaluation
//! - scan: Screen credential text for SQL injection fragments
//! - config: Print the default engine configuration or validate a config file

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use zerotrust_pulse::injection::find_sql_injection;
use zerotrust_pulse::{
    replay, EngineConfig, EvaluationRecord, TraceEvent, TrustError, TrustSession, ENGINE_VERSION,
    PRODUCER_NAME,
};

/// ztrust - Continuous authentication trust scoring
#[derive(Parser)]
#[command(name = "ztrust")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Turn behavioral signal traces into trust scores", long_about = None)]
struct Cli {
    /// Log engine decisions to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a signal trace against a fresh session
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Screen credential text for SQL injection
    Scan {
        /// Text to screen
        text: String,

        /// Output the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration, or validate a configuration file
    Config {
        /// Configuration file to validate
        #[arg(long)]
        validate: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one trace record per line)
    Ndjson,
    /// JSON array of trace records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one evaluation per line)
    Ndjson,
    /// JSON array of evaluations
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
        } => cmd_replay(&input, &output, input_format, output_format, config.as_deref()),

        Commands::Scan { text, json } => cmd_scan(&text, json),

        Commands::Config { validate } => cmd_config(validate.as_deref()),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), PulseCliError> {
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Ndjson => TraceEvent::parse_ndjson(&input_data)?,
        InputFormat::Json => TraceEvent::parse_array(&input_data)?,
    };

    if events.is_empty() {
        return Err(PulseCliError::NoEvents);
    }

    let config = match config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };

    let mut session = TrustSession::new(config)?;
    let records = replay(&mut session, &events)?;

    if records.is_empty() {
        return Err(PulseCliError::NoEvaluations);
    }

    log::info!(
        "replayed {} records, {} evaluations, session {}",
        events.len(),
        records.len(),
        session.id()
    );

    let output_data = format_output(&records, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_scan(text: &str, json: bool) -> Result<(), PulseCliError> {
    let matched = find_sql_injection(text);

    if json {
        let report = ScanReport {
            injection_detected: matched.is_some(),
            pattern: matched.map(str::to_string),
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        match matched {
            Some(pattern) => println!("[DETECTED] matched {:?}", pattern),
            None => println!("[CLEAN] no injection fragments found"),
        }
    }

    Ok(())
}

fn cmd_config(validate: Option<&Path>) -> Result<(), PulseCliError> {
    match validate {
        Some(path) => {
            EngineConfig::from_json(&fs::read_to_string(path)?)?;
            println!("[OK] {} is a valid {} configuration", path.display(), PRODUCER_NAME);
        }
        None => println!("{}", EngineConfig::default().to_json()?),
    }
    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(PulseCliError::InteractiveStdin);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_output(
    records: &[EvaluationRecord],
    format: &OutputFormat,
) -> Result<String, PulseCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Trust(TrustError),
    Json(serde_json::Error),
    NoEvents,
    NoEvaluations,
    InteractiveStdin,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<TrustError> for PulseCliError {
    fn from(e: TrustError) -> Self {
        PulseCliError::Trust(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Trust(e) => {
                let (code, hint) = match &e {
                    TrustError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Run 'ztrust config' to see a valid configuration")
                    }
                    TrustError::ParseError(_) | TrustError::JsonError(_) => {
                        ("PARSE_ERROR", "Ensure every line is a trace record with a \"type\" field")
                    }
                    _ => ("INPUT_ERROR", "Check sample values and timestamps in the trace"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No trace records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PulseCliError::NoEvaluations => CliError {
                code: "NO_EVALUATIONS".to_string(),
                message: "Trace contains no evaluate records".to_string(),
                hint: Some("Add {\"type\":\"evaluate\",\"at\":\"<RFC 3339 time>\"} records".to_string()),
            },
            PulseCliError::InteractiveStdin => CliError {
                code: "STDIN_IS_TTY".to_string(),
                message: "Refusing to read a trace from an interactive terminal".to_string(),
                hint: Some("Pipe a trace into ztrust or pass --input <file>".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ScanReport {
    injection_detected: bool,
    pattern: Option<String>,
}
