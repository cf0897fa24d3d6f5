//! csvmerge CLI
//!
//! Merges a folder of CSV usage exports into a single CSV file.

use clap::{ArgAction, Parser, ValueEnum};
use csvmerge_core::{parse_project_list, Defaults, MergeMode, MergeSettings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "csvmerge")]
#[command(about = "Merge multiple CSV files into a single CSV", long_about = None)]
#[command(version)]
struct Cli {
    /// Folder containing CSV files [default: SS]
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output CSV file path [default: merged.csv]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Add a "source_file" column with the original filename
    #[arg(short = 's', long)]
    add_source: bool,

    /// CSV delimiter, e.g. ";" or "\t" [default: ,]
    #[arg(short, long)]
    delimiter: Option<String>,

    /// File encoding, e.g. "utf-8-sig" or "cp1252" [default: utf-8]
    #[arg(short, long)]
    encoding: Option<String>,

    /// How to handle differing columns: union, intersection or strict [default: union]
    #[arg(short, long)]
    mode: Option<MergeMode>,

    /// Search the input folder recursively
    #[arg(short, long)]
    recursive: bool,

    /// Filename pattern to match [default: *.csv]
    #[arg(short, long)]
    pattern: Option<String>,

    /// Keep identifying columns such as project_name (removed by default)
    #[arg(long)]
    keep_identifying_info: bool,

    /// Comma-separated project_name values to keep
    #[arg(long)]
    only_projects: Option<String>,

    /// Comma-separated project_name values to remove
    #[arg(long)]
    exclude_projects: Option<String>,

    /// JSON settings file; flags given on the command line take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Settings given as flags; unset flags leave the value open
    fn settings(&self) -> MergeSettings {
        MergeSettings {
            input: self.input.clone(),
            output: self.output.clone(),
            add_source: self.add_source.then_some(true),
            delimiter: self.delimiter.clone(),
            encoding: self.encoding.clone(),
            mode: self.mode,
            recursive: self.recursive.then_some(true),
            pattern: self.pattern.clone(),
            keep_identifying_info: self.keep_identifying_info.then_some(true),
            only_projects: self.only_projects.as_deref().map(parse_project_list),
            exclude_projects: self.exclude_projects.as_deref().map(parse_project_list),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Initialize tracing on stderr; `RUST_LOG` overrides `-v`
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "csvmerge=info,csvmerge_core=info",
        1 => "csvmerge=debug,csvmerge_core=debug",
        _ => "csvmerge=trace,csvmerge_core=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn run(cli: &Cli) -> csvmerge_core::Result<()> {
    let file_settings = match &cli.config {
        Some(path) => MergeSettings::load(path)?,
        None => MergeSettings::default(),
    };

    let config = file_settings
        .overlay(cli.settings())
        .resolve(&Defaults::default())?;
    tracing::debug!(?config, "resolved configuration");

    let result = csvmerge_core::run(&config)?;

    println!("Removed {} duplicate rows.", result.duplicate_count);
    println!(
        "Done. Wrote {} rows and {} columns to {}",
        result.row_count(),
        result.column_count(),
        config.output.display()
    );

    Ok(())
}
