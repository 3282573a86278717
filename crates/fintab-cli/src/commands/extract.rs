//! Extract command - write tables from selected pages to CSV.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;

use fintab_core::models::parse_page_spec;
use fintab_core::{PdfDocument, PdfProcessor, TableExtractor};

use super::{emit_json, load_config, progress_bar};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Directory for the CSV files and _metadata.json
    #[arg(required = true)]
    output_dir: PathBuf,

    /// Pages to extract, e.g. "5,6,7", "5-10" or "5,8-12" (default: all)
    pages: Option<String>,

    /// Password for encrypted documents
    #[arg(long)]
    password: Option<String>,
}

pub fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    // Parse the selection before touching anything on disk.
    let selection = args.pages.as_deref().map(parse_page_spec).transpose()?;

    let doc = PdfDocument::open(&args.input, args.password.as_deref())?;
    let pages = selection.unwrap_or_else(|| (1..=doc.page_count()).collect());

    let pb = progress_bar(pages.len() as u64, "pages");
    let metadata = TableExtractor::new(&config).extract_with_progress(
        &doc,
        &pages,
        &args.output_dir,
        &mut |done: u32, _: u32| pb.set_position(done as u64),
    )?;
    pb.finish_and_clear();

    eprintln!(
        "{} Wrote {} table(s) to {}",
        style("✓").green(),
        metadata.tables.len(),
        args.output_dir.display()
    );
    for issue in metadata.page_errors.iter().chain(&metadata.skipped_pages) {
        eprintln!("  - page {}: {}", issue.page, issue.reason);
    }
    for warning in &metadata.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }
    let mismatches: usize = metadata.tables.iter().map(|t| t.validation.rows_mismatch).sum();
    if mismatches > 0 {
        eprintln!(
            "{} {} row(s) failed the row-total check (heuristic)",
            style("ℹ").blue(),
            mismatches
        );
    }

    emit_json(&metadata, None)
}
