//! Cross-validation text and reconciliation reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Positioned glyphs from the layout interpreter.
    Layout,
    /// Plain text from pdf-extract (no positions available).
    PdfExtract,
}

/// A number-like string found in page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberMatch {
    /// Matched text, trimmed.
    pub raw: String,
    /// Byte offset of the match in `text_simple`.
    pub start: usize,
    /// Byte offset one past the match.
    pub end: usize,
}

/// Extracted text of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page: u32,

    /// Text with horizontal positions preserved as spacing.
    #[serde(default)]
    pub text_layout: String,

    /// Text with single spaces between words.
    #[serde(default)]
    pub text_simple: String,

    #[serde(default)]
    pub char_count: usize,

    #[serde(default)]
    pub numbers_found: usize,

    #[serde(default)]
    pub numbers: Vec<NumberMatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TextSource>,

    /// Set instead of the text fields when the page could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cross-validation output for a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextReport {
    /// Absolute path of the source PDF.
    pub file: String,
    pub pages_requested: Vec<u32>,
    pub results: Vec<PageText>,
}

impl TextReport {
    /// Look up the text for a page.
    pub fn page(&self, page: u32) -> Option<&PageText> {
        self.results.iter().find(|p| p.page == page && p.error.is_none())
    }
}

/// Comparison of one table row against the page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowComparison {
    /// Whether every numeric cell of the row was found on the matching text line.
    pub matched: bool,
    /// Numeric cells of the table row, joined with ` | `.
    pub table_value: String,
    /// Numbers on the matching text line, joined with ` | `.
    pub text_value: Option<String>,
}

/// Reconciliation of extracted tables against cross-validation text.
///
/// Keys are `<csv file>#<row index>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rows_compared: usize,
    pub rows_matched: usize,
    pub rows: BTreeMap<String, RowComparison>,
}
