//! Tally CLI - Command-line interface for activity-tally
//!
//! Commands:
//! - quantify: Compute per-category durations for a day window
//! - validate: Validate reading records
//! - schema: Print the reading record schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use activity_tally::pipeline::{parse_readings, summarize};
use activity_tally::report::{format_duration, ReportEncoder};
use activity_tally::schema::{ReadingAdapter, ReadingEvent, SCHEMA_VERSION};
use activity_tally::{DaySummary, TallyConfig, TallyError, WindowSelector, TALLY_VERSION};

/// Tally - per-category activity durations over day windows
#[derive(Parser)]
#[command(name = "tally")]
#[command(version = TALLY_VERSION)]
#[command(about = "Turn activity readings into per-category durations", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute per-category durations for one day window
    Quantify {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Day offset, 0 = today, -1 = yesterday
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        day: i32,

        /// Reference instant for today's window (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<String>,

        /// UTC offset of the user's local day, e.g. "+02:00"
        #[arg(long)]
        utc_offset: Option<String>,

        /// Number of past days reachable before the earliest window
        #[arg(long)]
        lookback: Option<i32>,

        /// Load settings from a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Omit categories with zero duration
        #[arg(long)]
        hide_zero: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        output_format: OutputFormat,
    },

    /// Validate reading records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the reading record schema
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Detect from the first character
    Auto,
    /// Newline-delimited JSON (one reading per line)
    Ndjson,
    /// JSON array of readings
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Aligned table
    Text,
    /// Compact JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

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

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<(), TallyCliError> {
    match cli.command {
        Commands::Quantify {
            input,
            input_format,
            day,
            now,
            utc_offset,
            lookback,
            config,
            hide_zero,
            output_format,
        } => {
            let mut settings = match config {
                Some(path) => TallyConfig::from_file(&path)?,
                None => TallyConfig::default(),
            };
            if let Some(offset) = utc_offset {
                settings.utc_offset = offset;
            }
            if let Some(limit) = lookback {
                settings.lookback_limit = limit;
            }
            if hide_zero {
                settings.include_zero = false;
            }
            settings.validate()?;

            let now = match now {
                Some(s) => parse_now(&s)?,
                None => Utc::now(),
            };

            cmd_quantify(&input, input_format, day, now, &settings, output_format)
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

fn cmd_quantify(
    input: &Path,
    input_format: InputFormat,
    day: i32,
    now: DateTime<Utc>,
    config: &TallyConfig,
    output_format: OutputFormat,
) -> Result<(), TallyCliError> {
    let earliest = WindowSelector::new(config.lookback_limit).earliest();
    if day > 0 || day < earliest {
        return Err(TallyCliError::DayOutOfRange { day, earliest });
    }

    let events = read_events(input, input_format)?;
    debug!("loaded {} reading(s)", events.len());

    let summary = summarize(&events, day, now, config)?;

    let encoder = ReportEncoder::new().include_zero(config.include_zero);
    match output_format {
        OutputFormat::Text => print!("{}", render_table(&summary, config.include_zero)),
        OutputFormat::Json => println!("{}", serde_json::to_string(&encoder.encode(&summary))?),
        OutputFormat::JsonPretty => println!("{}", encoder.encode_to_json(&summary)?),
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), TallyCliError> {
    let events = read_events(input, input_format)?;
    let results = ReadingAdapter::validate_events(&events);

    let report = ValidationReport {
        total_readings: events.len(),
        valid_readings: events.len() - results.len(),
        invalid_readings: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                event_id: r.event_id.clone(),
                error: r.result.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total readings:   {}", report.total_readings);
        println!("Valid readings:   {}", report.valid_readings);
        println!("Invalid readings: {}", report.invalid_readings);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Reading {} (index {}): {}",
                    err.event_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_readings > 0 {
        Err(TallyCliError::ValidationFailed(report.invalid_readings))
    } else {
        Ok(())
    }
}

fn cmd_schema(json_schema: bool) -> Result<(), TallyCliError> {
    if json_schema {
        println!("{}", get_input_json_schema());
    } else {
        println!("Input Schema: {}", SCHEMA_VERSION);
        println!();
        println!("One record per activity transition, as NDJSON or a JSON array:");
        println!();
        println!("- schema_version: \"{}\" (optional)", SCHEMA_VERSION);
        println!("- event_id: producer identifier (optional)");
        println!("- timestamp: RFC 3339 instant the activity started");
        println!("- category: one of");
        for category in activity_tally::Category::ALL {
            println!("    {} ({})", category.as_str(), category.display_label());
        }
        println!();
        println!("Records must be in ascending timestamp order. The first record may");
        println!("predate the window; it is counted from the window start.");
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, TallyCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            warn!("reading from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_events(input: &Path, format: InputFormat) -> Result<Vec<ReadingEvent>, TallyCliError> {
    let data = read_input(input)?;
    let events = match format {
        InputFormat::Auto => parse_readings(&data)?,
        InputFormat::Ndjson => ReadingAdapter::parse_ndjson(&data)?,
        InputFormat::Json => ReadingAdapter::parse_array(&data)?,
    };
    Ok(events)
}

fn parse_now(s: &str) -> Result<DateTime<Utc>, TallyCliError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TallyCliError::Tally(TallyError::InvalidTimestamp(format!("{s}: {e}"))))
}

fn render_table(summary: &DaySummary, include_zero: bool) -> String {
    let window = &summary.window;
    let mut out = String::new();

    let title = match window.index {
        0 => "Today".to_string(),
        -1 => "Yesterday".to_string(),
        n => format!("{} days ago", -n),
    };
    out.push_str(&format!(
        "{} ({} to {})\n",
        title,
        window.start.to_rfc3339(),
        window.end.to_rfc3339()
    ));

    let width = summary
        .results
        .iter()
        .map(|r| r.label.len())
        .max()
        .unwrap_or(0);

    for result in summary
        .results
        .iter()
        .filter(|r| include_zero || !r.is_zero())
    {
        out.push_str(&format!(
            "  {:<width$}  {:>8}\n",
            result.label,
            format_duration(result.duration),
        ));
    }

    out.push_str(&format!(
        "  {:<width$}  {:>8}\n",
        "Untracked",
        format_duration(summary.untracked),
    ));
    out
}

fn get_input_json_schema() -> String {
    let categories: Vec<&str> = activity_tally::Category::ALL
        .iter()
        .map(|c| c.as_str())
        .collect();

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Activity transition reading",
        "type": "object",
        "required": ["timestamp", "category"],
        "properties": {
            "schema_version": {
                "type": "string",
                "const": SCHEMA_VERSION
            },
            "event_id": { "type": "string" },
            "timestamp": { "type": "string", "format": "date-time" },
            "category": {
                "type": "string",
                "enum": categories
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum TallyCliError {
    Io(io::Error),
    Tally(TallyError),
    Json(serde_json::Error),
    DayOutOfRange { day: i32, earliest: i32 },
    ValidationFailed(usize),
}

impl From<io::Error> for TallyCliError {
    fn from(e: io::Error) -> Self {
        TallyCliError::Io(e)
    }
}

impl From<TallyError> for TallyCliError {
    fn from(e: TallyError) -> Self {
        TallyCliError::Tally(e)
    }
}

impl From<serde_json::Error> for TallyCliError {
    fn from(e: serde_json::Error) -> Self {
        TallyCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TallyCliError> for CliError {
    fn from(e: TallyCliError) -> Self {
        match e {
            TallyCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TallyCliError::Tally(e) => {
                let hint = match e {
                    TallyError::InvalidTimezone(_) => "Use an offset like +02:00 or Z",
                    TallyError::InvalidTimestamp(_) => "Use RFC 3339, e.g. 2024-01-15T10:00:00Z",
                    TallyError::InvalidConfig(_) => "Check the config file fields",
                    _ => "Ensure input matches activity.reading.v1 (see 'tally schema')",
                };
                CliError {
                    code: "TALLY_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            TallyCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            TallyCliError::DayOutOfRange { day, earliest } => CliError {
                code: "DAY_OUT_OF_RANGE".to_string(),
                message: format!("Day {} is outside {}..=0", day, earliest),
                hint: Some("Raise --lookback or pick a later day".to_string()),
            },
            TallyCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} readings failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_readings: usize,
    valid_readings: usize,
    invalid_readings: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    event_id: Option<String>,
    error: String,
}
