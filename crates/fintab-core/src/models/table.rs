//! Extraction metadata written next to the CSV files.

use serde::{Deserialize, Serialize};

use crate::format::{NumberFormat, Scale};
use crate::table::TableStrategy;

/// Name of the metadata document inside an extraction directory.
pub const METADATA_FILE: &str = "_metadata.json";

/// Summary of a whole extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Absolute path of the source PDF.
    pub source_file: String,

    /// RFC 3339 timestamp of the run.
    pub generated_at: String,

    /// Pages the caller asked for.
    pub pages_requested: Vec<u32>,

    /// Pages that produced at least one table.
    pub pages_extracted: Vec<u32>,

    /// Number format inferred over every extracted cell.
    pub number_format: NumberFormat,

    /// Scale word found in the text of the requested pages.
    pub detected_scale: Option<Scale>,

    /// Currency found in the text of the requested pages.
    pub detected_currency: Option<String>,

    /// One entry per CSV written.
    pub tables: Vec<TableSummary>,

    /// Pages whose extraction failed.
    #[serde(default)]
    pub page_errors: Vec<PageIssue>,

    /// Pages that were out of range or produced no table.
    #[serde(default)]
    pub skipped_pages: Vec<PageIssue>,

    /// Free-form diagnostics for the caller.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A page that was skipped or failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIssue {
    pub page: u32,
    pub reason: String,
}

/// Summary of one extracted table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSummary {
    /// CSV file name, relative to the extraction directory.
    pub file: String,

    /// Page number (1-indexed).
    pub page: u32,

    /// Position of the table among the regions detected on the page (1-indexed).
    pub table_index: usize,

    /// Detection strategy that produced the table.
    pub strategy: TableStrategy,

    /// Table bounds on the page (x0, top, x1, bottom), top-left origin.
    pub bbox: [f64; 4],

    /// Data rows written to the CSV.
    pub rows: usize,

    /// Widest row.
    pub columns: usize,

    /// Number format inferred from this table's cells.
    pub number_format: NumberFormat,

    /// Scale word near this table.
    pub scale: Option<Scale>,

    /// Phrase the scale was detected from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_token: Option<String>,

    /// Currency near this table.
    pub currency: Option<String>,

    /// What the cleaning filters removed.
    pub cleaning: CleaningStats,

    /// Footnote and bullet rows removed from the grid.
    pub footnotes: Vec<String>,

    /// Row-total check results.
    pub validation: ValidationSummary,

    /// Statement type assigned by batch classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

/// Counts of what the cleaning filters changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    /// Leading RGB-artifact columns removed.
    pub artifact_columns: usize,
    /// Label-continuation columns merged into their neighbour.
    pub merged_columns: usize,
    /// Spacer rows dropped.
    pub empty_rows: usize,
    /// Footnote or bullet rows moved out of the grid.
    pub footnote_rows: usize,
}

/// Outcome of the row-total check for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Last numeric cell equals the sum of the others.
    Pass,
    /// Sum differs from the last numeric cell.
    Mismatch,
    /// Fewer than three numeric cells.
    Skipped,
}

/// Row-total check result for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCheck {
    /// Row index in the CSV (0-based).
    pub row: usize,
    pub status: RowStatus,
    /// Last numeric cell, normalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Sum of the preceding numeric cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Aggregated row-total results for one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Description of the assumption behind the check.
    pub heuristic: String,
    pub rows_checked: usize,
    pub rows_pass: usize,
    pub rows_mismatch: usize,
    pub rows_skipped: usize,
    /// Mismatched rows only.
    pub details: Vec<RowCheck>,
}
