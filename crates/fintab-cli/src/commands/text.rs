//! Text command - layout-preserving page text for cross-validation.

use std::path::{Path, PathBuf};

use clap::Args;

use fintab_core::models::parse_page_spec;
use fintab_core::{FintabError, PdfDocument, PdfProcessor, TextExtractor};

use super::{emit_json, json_failure, load_config, progress_bar};

/// Arguments for the text command.
#[derive(Args)]
pub struct TextArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Pages to extract, e.g. "5,6,7", "5-10" or "5,8-12" (default: all)
    pages: Option<String>,

    /// Password for encrypted documents
    #[arg(long)]
    password: Option<String>,

    /// Write the text JSON to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: TextArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let selection = args
        .pages
        .as_deref()
        .map(parse_page_spec)
        .transpose()
        .map_err(|e| json_failure(FintabError::from(e)))?;

    let doc = PdfDocument::open(&args.input, args.password.as_deref())
        .map_err(|e| json_failure(e.into()))?;
    let pages = selection.unwrap_or_else(|| (1..=doc.page_count()).collect());

    let pb = progress_bar(pages.len() as u64, "pages");
    let report = TextExtractor::new(&config).extract_with_progress(&doc, &pages, &mut |done: u32, _: u32| {
        pb.set_position(done as u64);
    });
    pb.finish_and_clear();

    emit_json(&report, args.output.as_deref())
}
