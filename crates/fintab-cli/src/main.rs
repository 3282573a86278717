//! CLI application for financial PDF table extraction.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, combine, compare, config, extract, scan, text};

/// Financial PDF tables - scan reports, extract statements to CSV, and cross-check them
#[derive(Parser)]
#[command(name = "fintab")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map where tables and financial keywords are in a PDF
    Scan(scan::ScanArgs),

    /// Extract tables from selected pages to CSV
    Extract(extract::ExtractArgs),

    /// Extract page text for cross-validation
    Text(text::TextArgs),

    /// Compare extracted tables against extracted page text
    Compare(compare::CompareArgs),

    /// Scan, extract, and classify every PDF in a directory
    Batch(batch::BatchArgs),

    /// Merge batch output into one CSV per statement type
    Combine(combine::CombineArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Scan(args) => scan::run(args, config_path),
        Commands::Extract(args) => extract::run(args, config_path),
        Commands::Text(args) => text::run(args, config_path),
        Commands::Compare(args) => compare::run(args),
        Commands::Batch(args) => batch::run(args, config_path),
        Commands::Combine(args) => combine::run(args),
        Commands::Config(args) => config::run(args, config_path),
    }
}
