//! Compare command - reconcile extracted tables with extracted text.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use fintab_core::crossval::compare;
use fintab_core::TextReport;

use super::emit_json;

/// Arguments for the compare command.
#[derive(Args)]
pub struct CompareArgs {
    /// Directory written by `fintab extract`
    #[arg(required = true)]
    extraction_dir: PathBuf,

    /// JSON written by `fintab text`
    #[arg(required = true)]
    text_json: PathBuf,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: CompareArgs) -> anyhow::Result<()> {
    if !args.extraction_dir.is_dir() {
        anyhow::bail!("Extraction directory not found: {}", args.extraction_dir.display());
    }

    let content = fs::read_to_string(&args.text_json)?;
    let report: TextReport = serde_json::from_str(&content)?;

    let validation = compare(&args.extraction_dir, &report)?;

    eprintln!(
        "{} {} of {} rows found in the page text",
        style("ℹ").blue(),
        style(validation.rows_matched).green(),
        validation.rows_compared
    );

    emit_json(&validation, args.output.as_deref())
}
