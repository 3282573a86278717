//! Table extraction to CSV with run metadata.

use std::fs;
use std::path::Path;

use chrono::Utc;
use csv::{QuoteStyle, WriterBuilder};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::format::{self, detect_currency, detect_scale, NumberFormat};
use crate::models::config::FintabConfig;
use crate::models::table::{ExtractionMetadata, PageIssue, TableSummary, METADATA_FILE};
use crate::pdf::layout::{plain_text, text_lines};
use crate::pdf::{PdfDocument, PdfProcessor};
use crate::scan::Progress;
use crate::table::clean::{clean_table, CleanedTable};
use crate::table::{RawTable, TableDetector};
use crate::validate::validate_rows;

/// File name for a table: `page_<N>_table_<M>.csv`.
pub fn table_file_name(page: u32, index: usize) -> String {
    format!("page_{}_table_{}.csv", page, index)
}

/// A cleaned table waiting to be written.
struct PendingTable {
    page: u32,
    index: usize,
    raw: RawTable,
    cleaned: CleanedTable,
    page_text: String,
}

/// Extracts, cleans, and validates tables from selected pages.
pub struct TableExtractor {
    config: FintabConfig,
    detector: TableDetector,
}

impl TableExtractor {
    /// Create an extractor from the pipeline configuration.
    pub fn new(config: &FintabConfig) -> Self {
        Self {
            config: config.clone(),
            detector: TableDetector::new(config.tables.clone()),
        }
    }

    /// Open `pdf` and extract `pages` into `out_dir`.
    ///
    /// The document is opened before the output directory is created, so a
    /// missing or locked file leaves nothing behind.
    pub fn extract_file(
        &self,
        pdf: &Path,
        password: Option<&str>,
        pages: &[u32],
        out_dir: &Path,
    ) -> Result<ExtractionMetadata> {
        let doc = PdfDocument::open(pdf, password)?;
        self.extract(&doc, pages, out_dir)
    }

    /// Extract `pages` of an open document into `out_dir`.
    pub fn extract<P: PdfProcessor>(&self, doc: &P, pages: &[u32], out_dir: &Path) -> Result<ExtractionMetadata> {
        self.extract_with_progress(doc, pages, out_dir, &mut |_, _| {})
    }

    /// Extract with a callback after each requested page.
    pub fn extract_with_progress<P: PdfProcessor>(
        &self,
        doc: &P,
        pages: &[u32],
        out_dir: &Path,
        progress: Progress<'_>,
    ) -> Result<ExtractionMetadata> {
        fs::create_dir_all(out_dir)?;

        let total = doc.page_count();
        let layout_options = self.config.tables.layout_options();
        info!("Extracting tables from {} page(s) of {}", pages.len(), doc.source());

        let mut pending: Vec<PendingTable> = Vec::new();
        let mut page_errors = Vec::new();
        let mut skipped_pages = Vec::new();
        let mut warnings = Vec::new();
        let mut all_text = String::new();

        for (done, &page) in pages.iter().enumerate() {
            progress(done as u32 + 1, pages.len() as u32);

            if page == 0 || page > total {
                warn!("Page {} out of range (1-{}), skipping", page, total);
                skipped_pages.push(PageIssue {
                    page,
                    reason: format!("out of range (1-{})", total),
                });
                continue;
            }

            let layout = match doc.page_layout(page) {
                Ok(layout) => layout,
                Err(e) => {
                    warn!("Page {}: {}", page, e);
                    page_errors.push(PageIssue {
                        page,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let lines = text_lines(&layout, &layout_options);
            let page_text = plain_text(&lines);
            all_text.push_str(&page_text);
            all_text.push('\n');

            let tables = self.detector.detect_lines(&layout, &lines).best();
            if tables.is_empty() {
                debug!("Page {}: no tables detected", page);
                skipped_pages.push(PageIssue {
                    page,
                    reason: "no tables detected".to_string(),
                });
                if page_text.chars().any(|c| c.is_ascii_digit()) {
                    warnings.push(format!(
                        "page {}: no table region detected although the page has numbers; \
                         cross-check with text extraction",
                        page
                    ));
                }
                continue;
            }

            info!("Page {}: {} table(s)", page, tables.len());
            for (i, raw) in tables.into_iter().enumerate() {
                let cleaned = clean_table(&raw.rows, &self.config.cleaning);
                pending.push(PendingTable {
                    page,
                    index: i + 1,
                    raw,
                    cleaned,
                    page_text: page_text.clone(),
                });
            }
        }

        let run_format = format::detect_number_format(
            pending
                .iter()
                .flat_map(|t| t.cleaned.rows.iter().flatten())
                .map(String::as_str),
        );
        debug!("Detected number format: {}", run_format.describe());

        let detected_scale = detect_scale(&all_text);
        let detected_currency = detect_currency(&all_text);

        let mut summaries = Vec::with_capacity(pending.len());
        let mut pages_extracted: Vec<u32> = Vec::new();

        for table in pending {
            if table.cleaned.rows.is_empty() {
                warnings.push(format!(
                    "page {} table {}: nothing left after cleaning; cross-check with text extraction",
                    table.page, table.index
                ));
                continue;
            }

            let summary = self.write_table(&table, run_format, out_dir)?;
            info!(
                "Wrote {} ({} rows, {} validated, {} mismatches)",
                summary.file,
                summary.rows,
                summary.validation.rows_pass,
                summary.validation.rows_mismatch
            );
            if !pages_extracted.contains(&table.page) {
                pages_extracted.push(table.page);
            }
            summaries.push(summary);
        }

        let metadata = ExtractionMetadata {
            source_file: doc.source(),
            generated_at: Utc::now().to_rfc3339(),
            pages_requested: pages.to_vec(),
            pages_extracted,
            number_format: run_format,
            detected_scale: detected_scale.map(|m| m.scale),
            detected_currency,
            tables: summaries,
            page_errors,
            skipped_pages,
            warnings,
        };

        write_metadata(&metadata, out_dir)?;
        info!("{} CSV file(s) written to {}", metadata.tables.len(), out_dir.display());

        Ok(metadata)
    }

    fn write_table(&self, table: &PendingTable, run_format: NumberFormat, out_dir: &Path) -> Result<TableSummary> {
        let rows = &table.cleaned.rows;
        let cells = || rows.iter().flatten().map(String::as_str);

        // A table without separator evidence follows the rest of the run.
        let number_format = match format::number_format_evidence(cells()) {
            (0, 0) => run_format,
            _ => format::detect_number_format(cells()),
        };

        let table_text = rows
            .iter()
            .map(|r| r.join(" "))
            .chain(table.cleaned.footnotes.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n");
        let scale = detect_scale(&table_text).or_else(|| detect_scale(&table.page_text));
        let currency = detect_currency(&table_text).or_else(|| detect_currency(&table.page_text));

        let file = table_file_name(table.page, table.index);
        write_csv(&out_dir.join(&file), rows)?;

        Ok(TableSummary {
            file,
            page: table.page,
            table_index: table.index,
            strategy: table.raw.strategy,
            bbox: table.raw.bbox,
            rows: rows.len(),
            columns: rows.iter().map(Vec::len).max().unwrap_or(0),
            number_format,
            scale: scale.as_ref().map(|m| m.scale),
            scale_token: scale.map(|m| m.token),
            currency,
            cleaning: table.cleaned.stats.clone(),
            footnotes: table.cleaned.footnotes.clone(),
            validation: validate_rows(rows, number_format),
            statement: None,
        })
    }
}

/// Write rows with every cell quoted, exactly as extracted.
pub fn write_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .flexible(true)
        .from_path(path)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a CSV written by [`write_csv`].
pub fn read_csv(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Write `_metadata.json` into `out_dir`.
pub fn write_metadata(metadata: &ExtractionMetadata, out_dir: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(metadata)?;
    fs::write(out_dir.join(METADATA_FILE), content)?;
    Ok(())
}

/// Load `_metadata.json` from an extraction directory.
pub fn read_metadata(out_dir: &Path) -> Result<ExtractionMetadata> {
    let content = fs::read_to_string(out_dir.join(METADATA_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{PageLayout, TextChar};
    use crate::table::TableStrategy;
    use crate::PdfError;
    use pretty_assertions::assert_eq;

    fn chars(text: &str, x: f64, baseline: f64) -> Vec<TextChar> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| TextChar {
                text: ch.to_string(),
                x0: x + i as f64 * 5.0,
                x1: x + (i + 1) as f64 * 5.0,
                top: baseline - 10.0,
                bottom: baseline,
                size: 10.0,
            })
            .collect()
    }

    struct FakePdf(Vec<Option<PageLayout>>);

    impl PdfProcessor for FakePdf {
        fn source(&self) -> String {
            "/tmp/report.pdf".to_string()
        }

        fn page_count(&self) -> u32 {
            self.0.len() as u32
        }

        fn page_layout(&self, page: u32) -> crate::pdf::Result<PageLayout> {
            self.0[page as usize - 1].clone().ok_or(PdfError::Content {
                page,
                reason: "bad stream".to_string(),
            })
        }
    }

    fn statement_page(page: u32) -> PageLayout {
        let rows: &[(&str, f64, f64)] = &[
            ("Figures in millions of pesos", 50.0, 60.0),
            ("3Q25", 200.0, 100.0),
            ("3Q24", 300.0, 100.0),
            ("Total", 400.0, 100.0),
            ("Revenue", 50.0, 115.0),
            ("1,500.0", 200.0, 115.0),
            ("1,200.0", 300.0, 115.0),
            ("2,700.0", 400.0, 115.0),
            ("Net Income", 50.0, 130.0),
            ("300", 200.0, 130.0),
            ("250", 300.0, 130.0),
            ("549", 400.0, 130.0),
        ];
        PageLayout {
            page,
            width: 612.0,
            height: 792.0,
            chars: rows.iter().flat_map(|(t, x, y)| chars(t, *x, *y)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_pages() {
        let doc = FakePdf(vec![
            Some(PageLayout { page: 1, ..Default::default() }),
            Some(statement_page(2)),
            None,
        ]);
        let dir = tempfile::tempdir().unwrap();
        let extractor = TableExtractor::new(&FintabConfig::default());

        let metadata = extractor.extract(&doc, &[1, 2, 3, 9], dir.path()).unwrap();

        assert_eq!(metadata.pages_extracted, vec![2]);
        assert_eq!(metadata.tables.len(), 1);
        assert_eq!(metadata.page_errors.len(), 1);
        assert_eq!(metadata.page_errors[0].page, 3);
        let skipped: Vec<u32> = metadata.skipped_pages.iter().map(|p| p.page).collect();
        assert_eq!(skipped, vec![1, 9]);

        let table = &metadata.tables[0];
        assert_eq!(table.file, "page_2_table_1.csv");
        assert_eq!(table.strategy, TableStrategy::Text);
        assert_eq!(table.rows, 3);
        assert_eq!(table.columns, 4);
        assert_eq!(table.scale, Some(format::Scale::Millions));
        assert_eq!(table.currency.as_deref(), Some("MXN"));
        assert_eq!(table.validation.rows_pass, 1);
        assert_eq!(table.validation.rows_mismatch, 1);
        assert_eq!(table.validation.details[0].row, 2);

        let csv = fs::read_to_string(dir.path().join("page_2_table_1.csv")).unwrap();
        assert_eq!(
            csv.lines().collect::<Vec<_>>(),
            vec![
                r#""","3Q25","3Q24","Total""#,
                r#""Revenue","1,500.0","1,200.0","2,700.0""#,
                r#""Net Income","300","250","549""#,
            ]
        );

        let stored = read_metadata(dir.path()).unwrap();
        assert_eq!(stored.tables[0].file, table.file);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let doc = FakePdf(vec![Some(statement_page(1))]);
        let extractor = TableExtractor::new(&FintabConfig::default());

        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        extractor.extract(&doc, &[1], a.path()).unwrap();
        extractor.extract(&doc, &[1], b.path()).unwrap();

        let read = |d: &Path| fs::read(d.join("page_1_table_1.csv")).unwrap();
        assert_eq!(read(a.path()), read(b.path()));
    }

    #[test]
    fn test_missing_file_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = TableExtractor::new(&FintabConfig::default())
            .extract_file(&dir.path().join("missing.pdf"), None, &[1], &out)
            .unwrap_err();

        assert!(matches!(err, crate::FintabError::Pdf(PdfError::NotFound(_))));
        assert!(!out.exists());
    }
}
