//! Scan command - map the financial content of a PDF.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::debug;

use fintab_core::{PageScanner, PdfDocument, PdfProcessor};

use super::{emit_json, json_failure, load_config, progress_bar};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Password for encrypted documents
    #[arg(long)]
    password: Option<String>,

    /// Write the scan JSON to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: ScanArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let doc = PdfDocument::open(&args.input, args.password.as_deref())
        .map_err(|e| json_failure(e.into()))?;

    let pb = progress_bar(doc.page_count() as u64, "pages");
    let report = PageScanner::new(&config).scan_with_progress(&doc, &mut |done: u32, _: u32| {
        pb.set_position(done as u64);
    });
    pb.finish_and_clear();

    eprintln!(
        "{} {} of {} pages have financial content",
        style("ℹ").blue(),
        report.financial_page_count,
        report.total_pages
    );
    if let Some(suggestion) = &report.suggestion {
        eprintln!("{} {}", style("!").yellow(), suggestion);
    }

    emit_json(&report, args.output.as_deref())?;
    debug!("Scan finished in {:?}", start.elapsed());

    Ok(())
}
