//! gedmelt: Flatten a GEDCOM file into relational CSV tables
//!
//! Usage:
//!   # One CSV per table in the current directory
//!   gedmelt family.ged
//!
//!   # Write to a directory, averaging fuzzy dates like "Abt. 1780 - 1790"
//!   gedmelt family.ged -o ./tables --force-date-delimiters "abt.,bef.,aft.,-"
//!
//!   # Start from a JSON config file and add the child -> parent table
//!   gedmelt family.ged --config melt.json --parents

// Use MiMalloc allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use gedmelt::melt::{CsvTableWriter, MeltConfig};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "gedmelt")]
#[command(about = "Flatten a GEDCOM file into relational CSV tables", long_about = None)]
struct Args {
    /// GEDCOM file to convert
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output directory for one .csv file per table
    /// If neither this nor --rdf is given, CSV files go to the current directory
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Write an RDF graph to this file (not implemented; reported and skipped)
    #[arg(long, value_name = "FILE")]
    rdf: Option<PathBuf>,

    /// JSON config file; command-line flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Comma-separated delimiters for splitting and averaging unparseable dates
    #[arg(long)]
    force_date_delimiters: Option<String>,

    /// Generate the PARENTS table of child -> parent edges
    #[arg(long)]
    parents: bool,

    /// Copy each individual's first NAME into a NAME column
    #[arg(long)]
    copy_name: bool,

    /// Logging verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    None,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);
    run(&args)
}

fn run(args: &Args) -> Result<()> {
    // Build config
    let mut config = match &args.config {
        Some(path) => MeltConfig::from_json_file(path)?,
        None => MeltConfig::default(),
    };
    if let Some(delimiters) = &args.force_date_delimiters {
        config.force_date_delimiters = Some(
            delimiters
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }
    if args.parents {
        config.generate_parents_table = true;
    }
    if args.copy_name {
        config.copy_individual_name = true;
    }

    let registry = gedmelt::melt_file(&args.input, config)?;

    for table in registry.tables() {
        log::info!(
            "Table {}: {} rows, {} columns",
            table.name,
            table.row_count(),
            table.columns().len()
        );
    }

    if let Some(rdf) = &args.rdf {
        log::warn!("RDF output requested for {} but is not implemented", rdf.display());
        eprintln!("{}", rdf_notice(rdf));
    }

    let Some(output_dir) = csv_target(args.output_dir.as_deref(), args.rdf.as_deref())? else {
        return Ok(());
    };

    let writer = CsvTableWriter::new(&output_dir)?;
    let report = writer.write_registry(&registry);

    eprintln!(
        "Wrote {} tables to {}",
        report.written.len(),
        output_dir.display()
    );
    for failure in &report.failed {
        eprintln!("✗ {}", failure);
    }
    if !report.is_success() {
        bail!("{} of {} tables failed to write", report.failed.len(), registry.len());
    }

    Ok(())
}

/// Directory for CSV output. An explicit `-o` always wins; with no target at
/// all the current directory is used, and an RDF-only request writes no CSV.
fn csv_target(output_dir: Option<&Path>, rdf: Option<&Path>) -> Result<Option<PathBuf>> {
    match (output_dir, rdf) {
        (Some(dir), _) => Ok(Some(dir.to_path_buf())),
        (None, None) => Ok(Some(std::env::current_dir()?)),
        (None, Some(_)) => Ok(None),
    }
}

fn rdf_notice(rdf: &Path) -> String {
    format!("⚠ RDF output is not implemented; no file written to {}", rdf.display())
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}
