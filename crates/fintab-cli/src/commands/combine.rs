//! Combine command - line up statements across periods.

use std::path::PathBuf;

use clap::Args;
use console::style;

use fintab_core::Combiner;

use super::emit_json;

/// Arguments for the combine command.
#[derive(Args)]
pub struct CombineArgs {
    /// Directory holding the <period>_tables folders written by `fintab batch`
    #[arg(required = true)]
    parent: PathBuf,

    /// Where to write combined_<type>.csv (default: the parent directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

pub fn run(args: CombineArgs) -> anyhow::Result<()> {
    let out_dir = args.output_dir.clone().unwrap_or_else(|| args.parent.clone());
    let summary = Combiner::new().combine(&args.parent, &out_dir)?;

    for (statement, combined) in &summary.statements {
        eprintln!(
            "{} {}: {} line items over {} period(s) -> {}",
            style("✓").green(),
            statement,
            combined.line_items,
            combined.periods.len(),
            out_dir.join(&combined.file).display()
        );
    }
    if summary.statements.is_empty() {
        eprintln!("{} No classified statements found", style("!").yellow());
    }

    emit_json(&summary, None)
}
