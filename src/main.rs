use anyhow::Result;
use clap::{Parser, Subcommand};
use rosterize::RosterPipeline;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rosterize", about = "Split volunteer rosters and export them to PDF", version)]
struct Cli {
    /// Directory holding the excels_*/pdfs_* output folders.
    #[arg(long, default_value = ".", global = true)]
    base_dir: PathBuf,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Write the run report as JSON to this path.
    #[arg(long, global = true)]
    report_json: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a master workbook into per-volunteer sheets.
    Split {
        /// Master workbook, e.g. "Guntur District.xlsx".
        master: PathBuf,
    },
    /// Convert the sheets of one district to PDFs.
    Export {
        /// District name as derived from the master file.
        district: String,
        /// Restrict to these tab folders (comma separated).
        #[arg(long, value_delimiter = ',')]
        tabs: Option<Vec<String>>,
        /// Concurrent exports per folder.
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Headless converter binary.
        #[arg(long, default_value = "soffice")]
        converter: String,
        /// Per-document conversion deadline in seconds.
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
    /// Re-run every failure ledger: repair, re-export, prune.
    Retry {
        #[arg(long, default_value = "soffice")]
        converter: String,
        #[arg(long, default_value_t = 3)]
        attempts: usize,
        /// Seconds to wait between attempts on the same file.
        #[arg(long, default_value_t = 2)]
        backoff_secs: u64,
    },
    /// Find corrupted sheets and rebuild them from the master.
    Repair { master: PathBuf },
    /// Remove editor and converter temp litter from the output folders.
    Cleanup,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let pipeline = RosterPipeline::new()
        .base_dir(&cli.base_dir)
        .progress(!cli.no_progress);

    match cli.command {
        Commands::Split { master } => {
            let report = pipeline.split(&master)?;
            println!("{}", report.summary());
            write_report(&cli.report_json, &report)?;
        }
        Commands::Export {
            district,
            tabs,
            workers,
            converter,
            timeout_secs,
        } => {
            let pipeline = pipeline
                .workers(workers)
                .converter(&converter)
                .converter_timeout(Duration::from_secs(timeout_secs));
            let report = match tabs {
                Some(tabs) => {
                    let backend = std::sync::Arc::new(rosterize::CommandBackend::new(
                        converter,
                        Duration::from_secs(timeout_secs),
                    ));
                    pipeline.export_with(backend, &district, Some(&tabs))?
                }
                None => pipeline.export_all(&district)?,
            };
            println!("{}", report.summary());
            write_report(&cli.report_json, &report)?;
        }
        Commands::Retry {
            converter,
            attempts,
            backoff_secs,
        } => {
            let report = pipeline
                .converter(&converter)
                .retry_attempts(attempts)
                .retry_backoff(Duration::from_secs(backoff_secs))
                .retry_failed()?;
            println!("{}", report.summary());
            write_report(&cli.report_json, &report)?;
        }
        Commands::Repair { master } => {
            let report = pipeline.repair_sheets(&master)?;
            println!("{}", report.summary());
            write_report(&cli.report_json, &report)?;
        }
        Commands::Cleanup => {
            let report = pipeline.cleanup()?;
            println!("{}", report.summary());
            write_report(&cli.report_json, &report)?;
        }
    }
    Ok(())
}

fn write_report<T: serde::Serialize>(path: &Option<PathBuf>, report: &T) -> Result<()> {
    if let Some(path) = path {
        rosterize::write_json(report, path)?;
        println!("report written to {}", path.display());
    }
    Ok(())
}
