//! Batch command - run the whole pipeline over a directory of reports.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use tracing::debug;

use fintab_core::batch::{find_pdfs, BatchStatus};
use fintab_core::BatchProcessor;

use super::{emit_json, load_config, progress_bar};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Directory of PDF reports, or a glob pattern such as "reports/*Q25.pdf"
    #[arg(required = true)]
    input: String,

    /// Base directory for the <period>_tables folders (default: next to each PDF)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Password for encrypted documents
    #[arg(long)]
    password: Option<String>,
}

pub fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let input = Path::new(&args.input);
    let mut files: Vec<PathBuf> = if input.is_dir() {
        find_pdfs(input)?
    } else {
        glob(&args.input)?
            .filter_map(|r| r.ok())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
            })
            .collect()
    };
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if files.is_empty() {
        anyhow::bail!("No PDF files found for: {}", args.input);
    }

    eprintln!(
        "{} Found {} PDF reports to process",
        style("ℹ").blue(),
        files.len()
    );

    let pb = progress_bar(files.len() as u64, "files");
    let summary = BatchProcessor::new(&config).process_files(
        &files,
        args.output_dir.as_deref(),
        args.password.as_deref(),
        &mut |done: u32, _: u32| pb.set_position(done as u64),
    );
    pb.finish_with_message("Complete");

    eprintln!();
    eprintln!(
        "{} Processed {} PDFs in {:?}",
        style("✓").green(),
        summary.total_pdfs,
        start.elapsed()
    );
    eprintln!(
        "   {} successful, {} failed",
        style(summary.successful).green(),
        style(summary.failed).red()
    );

    let failed: Vec<_> = summary
        .results
        .iter()
        .filter(|r| r.status != BatchStatus::Ok)
        .collect();
    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Not extracted:").red());
        for result in failed {
            eprintln!(
                "  - {} ({:?}): {}",
                result.file,
                result.status,
                result.error.as_deref().unwrap_or("no financial pages")
            );
        }
    }

    let coverage = summary.coverage();
    if !coverage.is_empty() {
        eprintln!();
        eprintln!("Statement types found across all reports:");
        for (statement, periods) in &coverage {
            eprintln!("  {}: {} period(s)", statement, periods.len());
        }
    }

    debug!("Batch finished in {:?}", start.elapsed());
    emit_json(&summary, None)
}
