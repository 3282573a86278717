//! Layout-preserving text extraction for cross-validation, and
//! reconciliation of extracted tables against that text.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extract::{read_csv, read_metadata};
use crate::format::normalize_number_string;
use crate::models::config::FintabConfig;
use crate::models::text::{
    NumberMatch, PageText, RowComparison, TextReport, TextSource, ValidationReport,
};
use crate::patterns::TEXT_NUMBER;
use crate::pdf::layout::{layout_text, plain_text, text_lines};
use crate::pdf::{LayoutOptions, PdfDocument, PdfProcessor};
use crate::scan::Progress;

/// Number-like strings in text, with byte offsets.
pub fn extract_numbers(text: &str) -> Vec<NumberMatch> {
    TEXT_NUMBER
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str().trim();
            raw.chars().any(|c| c.is_ascii_digit()).then(|| NumberMatch {
                raw: raw.to_string(),
                start: m.start(),
                end: m.end(),
            })
        })
        .collect()
}

/// Extracts per-page text for comparison against table output.
pub struct TextExtractor {
    layout: LayoutOptions,
}

impl TextExtractor {
    /// Create a text extractor from the pipeline configuration.
    pub fn new(config: &FintabConfig) -> Self {
        Self {
            layout: config.tables.layout_options(),
        }
    }

    /// Open `pdf` and extract the text of `pages`.
    pub fn extract_file(&self, pdf: &Path, password: Option<&str>, pages: &[u32]) -> Result<TextReport> {
        let doc = PdfDocument::open(pdf, password)?;
        Ok(self.extract(&doc, pages))
    }

    /// Extract the text of `pages`. Pages that cannot be read get an error entry.
    pub fn extract<P: PdfProcessor>(&self, doc: &P, pages: &[u32]) -> TextReport {
        self.extract_with_progress(doc, pages, &mut |_, _| {})
    }

    /// Extract with a callback after each requested page.
    pub fn extract_with_progress<P: PdfProcessor>(
        &self,
        doc: &P,
        pages: &[u32],
        progress: Progress<'_>,
    ) -> TextReport {
        let total = doc.page_count();
        info!("Extracting text from {} page(s)", pages.len());

        let mut fallback: Option<Option<Vec<String>>> = None;
        let mut results = Vec::with_capacity(pages.len());

        for (done, &page) in pages.iter().enumerate() {
            let result = if page == 0 || page > total {
                error_entry(
                    page,
                    format!("Page {} does not exist (PDF has {} pages)", page, total),
                )
            } else {
                match doc.page_layout(page) {
                    Ok(layout) if !layout.chars.is_empty() => {
                        let lines = text_lines(&layout, &self.layout);
                        page_text(page, layout_text(&lines), plain_text(&lines), TextSource::Layout)
                    }
                    Ok(_) => {
                        let text = fallback
                            .get_or_insert_with(|| doc.fallback_text())
                            .as_ref()
                            .and_then(|all| all.get(page as usize - 1))
                            .map(|t| t.trim().to_string())
                            .unwrap_or_default();
                        let source = if text.is_empty() {
                            TextSource::Layout
                        } else {
                            TextSource::PdfExtract
                        };
                        page_text(page, text.clone(), text, source)
                    }
                    Err(e) => {
                        warn!("Page {}: {}", page, e);
                        error_entry(page, e.to_string())
                    }
                }
            };

            debug!("Page {}: {} numbers found", page, result.numbers_found);
            results.push(result);
            progress(done as u32 + 1, pages.len() as u32);
        }

        TextReport {
            file: doc.source(),
            pages_requested: pages.to_vec(),
            results,
        }
    }
}

fn page_text(page: u32, text_layout: String, text_simple: String, source: TextSource) -> PageText {
    let numbers = extract_numbers(&text_simple);
    PageText {
        page,
        char_count: text_simple.chars().count(),
        numbers_found: numbers.len(),
        numbers,
        text_layout,
        text_simple,
        source: Some(source),
        error: None,
    }
}

fn error_entry(page: u32, error: String) -> PageText {
    PageText {
        page,
        text_layout: String::new(),
        text_simple: String::new(),
        char_count: 0,
        numbers_found: 0,
        numbers: Vec::new(),
        source: None,
        error: Some(error),
    }
}

fn normalize_label(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The text line for a row label: one that starts with it, else one that contains it.
fn find_line<'a>(lines: &[&'a str], label: &str) -> Option<&'a str> {
    let label = normalize_label(label);
    let normalized: Vec<String> = lines.iter().map(|l| normalize_label(l)).collect();
    normalized
        .iter()
        .position(|l| l.starts_with(&label))
        .or_else(|| normalized.iter().position(|l| l.contains(&label)))
        .map(|i| lines[i])
}

/// Case-insensitive matcher for a label inside a line, tolerant of
/// whitespace runs on either side.
fn label_matcher(label: &str) -> Option<Regex> {
    let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    RegexBuilder::new(&words.join(r"\s+"))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Compare every labeled numeric row of an extraction directory against
/// the page text in `report`. Neither input is modified.
pub fn compare(extraction_dir: &Path, report: &TextReport) -> Result<ValidationReport> {
    let metadata = read_metadata(extraction_dir)?;
    let mut out = ValidationReport::default();

    for table in &metadata.tables {
        let Some(text) = report.page(table.page) else {
            debug!("No text for page {}, skipping {}", table.page, table.file);
            continue;
        };
        let lines: Vec<&str> = text.text_simple.lines().collect();
        let rows = read_csv(&extraction_dir.join(&table.file))?;
        let fmt = table.number_format;

        for (i, row) in rows.iter().enumerate() {
            let Some(label) = row.first().map(|c| c.trim()).filter(|c| !c.is_empty()) else {
                continue;
            };
            if normalize_number_string(label, fmt).is_some() {
                continue;
            }

            let values: Vec<&str> = row[1..]
                .iter()
                .map(|c| c.trim())
                .filter(|c| c.chars().any(|ch| ch.is_ascii_digit()))
                .filter(|c| normalize_number_string(c, fmt).is_some())
                .collect();
            if values.is_empty() {
                continue;
            }

            let matcher = label_matcher(label);
            let line_numbers: Option<Vec<String>> = find_line(&lines, label).map(|line| {
                // Skip digits that belong to the label itself.
                let rest = matcher
                    .as_ref()
                    .and_then(|re| re.find(line))
                    .map(|m| &line[m.end()..])
                    .unwrap_or(line);
                extract_numbers(rest).into_iter().map(|n| n.raw).collect()
            });

            let matched = line_numbers.as_ref().is_some_and(|found| {
                let found: Vec<Option<String>> = found
                    .iter()
                    .map(|n| normalize_number_string(n, fmt))
                    .collect();
                values
                    .iter()
                    .all(|v| found.contains(&normalize_number_string(v, fmt)))
            });

            out.rows_compared += 1;
            if matched {
                out.rows_matched += 1;
            }
            out.rows.insert(
                format!("{}#{}", table.file, i),
                RowComparison {
                    matched,
                    table_value: values.join(" | "),
                    text_value: line_numbers.map(|n| n.join(" | ")),
                },
            );
        }
    }

    info!("{} of {} rows matched the page text", out.rows_matched, out.rows_compared);
    Ok(out)
}
