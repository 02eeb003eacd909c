//! sms-report - render an SMS/MMS XML backup as an HTML page of threads
//!
//! Usage: sms-report [OPTIONS]
//!
//! With no options it reads `input/input.xml` and writes `output/index.html`.
//! Paths and rendering choices can also come from a JSON settings file;
//! flags override the file.

use clap::Parser;
use sms_report_lib::{build_report, render, Settings};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sms-report", version, about = "Render an SMS/MMS XML backup as an HTML report")]
struct Cli {
    /// Backup XML file (default: input/input.xml)
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Report HTML file, overwritten if present (default: output/index.html)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Settings file; ignored when missing
    #[arg(long, default_value = "sms-report.json")]
    settings: PathBuf,

    /// Country code stripped from the front of addresses (default: +39)
    #[arg(long)]
    country_prefix: Option<String>,

    /// Page title and heading (default: "Message Threads")
    #[arg(long)]
    title: Option<String>,

    /// Abort on the first unparsable date instead of warning
    #[arg(long)]
    strict_dates: bool,

    /// Insert message bodies without HTML escaping (old output format)
    #[arg(long)]
    raw_bodies: bool,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    save_settings: bool,

    /// Print the aggregated threads as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Suppress progress output
    #[arg(long, short)]
    quiet: bool,

    /// Detailed logging
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(input) = &self.input {
            settings.input_path = input.clone();
        }
        if let Some(output) = &self.output {
            settings.output_path = output.clone();
        }
        if let Some(prefix) = &self.country_prefix {
            settings.country_prefix = prefix.clone();
        }
        if let Some(title) = &self.title {
            settings.title = title.clone();
        }
        if self.strict_dates {
            settings.strict_dates = true;
        }
        if self.raw_bodies {
            settings.escape_bodies = false;
        }
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
/// `RUST_LOG` wins over the verbosity flags.
fn init_logging(quiet: bool, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    if let Err(e) = run_cli(cli) {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<(), String> {
    let mut settings = Settings::load(&cli.settings).map_err(|e| e.to_string())?;
    cli.apply_to(&mut settings);

    if cli.save_settings {
        settings.save(&cli.settings).map_err(|e| e.to_string())?;
        info!(path = %cli.settings.display(), "settings saved");
        return Ok(());
    }

    let start = Instant::now();
    info!(input = %settings.input_path.display(), "reading backup");

    let (report, html) = build_report(&settings.input_path, &settings).map_err(|e| e.to_string())?;
    render::write_report(&settings.output_path, &html).map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{}", json);
    }

    if !report.warnings.is_empty() {
        warn!(count = report.warnings.len(), "some dates could not be parsed; those messages are listed last");
    }

    info!(
        output = %settings.output_path.display(),
        threads = report.threads.len(),
        messages = report.messages_kept,
        duplicates = report.duplicates_skipped,
        warnings = report.warnings.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "report written"
    );

    Ok(())
}
