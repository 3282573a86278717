//! Batch pipeline: scan, select, extract, and classify a directory of reports.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FintabError, Result};
use crate::extract::{read_csv, write_metadata, TableExtractor};
use crate::models::config::{BatchConfig, FintabConfig};
use crate::models::page::{PageRecord, ScanReport};
use crate::models::table::ExtractionMetadata;
use crate::patterns::PERIOD;
use crate::pdf::{PdfDocument, PdfProcessor};
use crate::scan::{PageScanner, Progress};

/// Statement types, in classification priority order.
pub const STATEMENT_TYPES: &[&str] = &[
    "income_statement",
    "balance_sheet",
    "cash_flow",
    "noi_ebitda",
    "ffo_affo",
    "key_indicators",
    "credit_profile",
];

lazy_static! {
    static ref STATEMENT_PATTERNS: Vec<(&'static str, Vec<Regex>)> = {
        let table: [(&'static str, &[&str]); 7] = [
            ("income_statement", &[
                r"income\s+statement",
                r"estado\s+de\s+resultados",
                r"consolidated\s+statements?\s+of\s+(?:comprehensive\s+)?income",
                r"rental\s*income.*operating\s*expenses.*net\s*income",
            ]),
            ("balance_sheet", &[
                r"balance\s+sheet",
                r"estado\s+de\s+posici[oó]n\s+financiera",
                r"financial\s+position",
                r"(?:total\s+)?assets.*(?:total\s+)?liabilities",
                r"investment\s+properties.*total\s+assets",
            ]),
            ("cash_flow", &[
                r"cash\s+flow",
                r"flujo\s+de\s+efectivo",
                r"operating\s+activities.*investing\s+activities",
            ]),
            ("noi_ebitda", &[
                r"\bNOI\b.*\bEBITDA\b",
                r"\bEBITDA\b.*\bNOI\b",
                r"net\s+operating\s+income.*ebitda",
                r"\bNOI\b\s+(?:margin|breakdown)",
            ]),
            ("ffo_affo", &[
                r"\bFFO\b.*\bAFFO\b",
                r"\bAFFO\b.*\bFFO\b",
                r"funds\s+from\s+operations",
                r"adjusted\s+funds\s+from\s+operations",
            ]),
            ("key_indicators", &[
                r"key\s+(?:financial\s+)?indicators",
                r"key\s+quarterly",
                r"indicadores\s+clave",
                r"quarterly\s+(?:financial\s+)?highlights",
            ]),
            ("credit_profile", &[
                r"credit\s+profile",
                r"perfil\s+(?:de\s+)?cr[eé]dito",
                r"debt\s+(?:maturity|profile|structure)",
                r"loan[- ]to[- ]value.*leverage",
                r"\bLTV\b.*\bdebt\b",
            ]),
        ];
        table
            .into_iter()
            .map(|(name, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
                    .collect();
                (name, compiled)
            })
            .collect()
    };
}

/// Period label from a report file name: `3Q25.pdf` → `3Q25`, otherwise the stem.
pub fn derive_period(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match PERIOD.find(&stem) {
        Some(m) if m.start() == 0 => m.as_str().to_uppercase(),
        _ => stem,
    }
}

/// Best statement type for a block of text, with the number of patterns that hit.
///
/// Ties go to the earlier type in [`STATEMENT_TYPES`].
pub fn classify_text(text: &str) -> Option<(&'static str, usize)> {
    let mut best: Option<(&'static str, usize)> = None;
    for (name, patterns) in STATEMENT_PATTERNS.iter() {
        let score = patterns.iter().filter(|p| p.is_match(text)).count();
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((*name, score));
        }
    }
    best
}

/// Classify a table from its leading rows.
pub fn classify_rows(rows: &[Vec<String>], limit: usize) -> Option<(&'static str, usize)> {
    let text = rows
        .iter()
        .take(limit)
        .map(|row| {
            row.iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" ");
    classify_text(&text)
}

/// Classify a page from its scan record (keywords plus preview).
pub fn classify_page(record: &PageRecord) -> Option<(&'static str, usize)> {
    let text = format!("{} {}", record.financial_keywords.join(" "), record.preview);
    classify_text(&text)
}

/// Pages worth extracting, best first.
///
/// A page qualifies with at least one table and `min_keywords` keyword
/// matches, scored `2 * keywords + tables`. When nothing qualifies, pages
/// with tables and a single keyword are accepted instead.
pub fn select_pages(report: &ScanReport, config: &BatchConfig) -> Vec<u32> {
    let mut scored: Vec<(u32, usize)> = report
        .pages
        .iter()
        .filter(|p| p.tables > 0 && p.financial_keywords.len() >= config.min_keywords)
        .map(|p| (p.page, p.financial_keywords.len() * 2 + p.tables))
        .collect();

    if scored.is_empty() {
        scored = report
            .pages
            .iter()
            .filter(|p| p.tables > 0 && !p.financial_keywords.is_empty())
            .map(|p| (p.page, p.financial_keywords.len()))
            .collect();
    }

    // Stable: equal scores keep page order.
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().take(config.max_pages).map(|(page, _)| page).collect()
}

/// Outcome of one document in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Ok,
    ScanFailed,
    NoFinancialPages,
    ExtractFailed,
}

/// Result for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Source PDF.
    pub file: String,

    /// Period label derived from the file name.
    pub period: String,

    pub status: BatchStatus,

    /// Directory the tables were written to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// Pages handed to the extractor.
    #[serde(default)]
    pub pages_extracted: Vec<u32>,

    /// Statement key (`income_statement`, `balance_sheet_2`, ...) to CSV path.
    #[serde(default)]
    pub tables: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_metadata: Option<ExtractionMetadata>,
}

impl BatchResult {
    fn new(file: &Path, period: String, status: BatchStatus) -> Self {
        Self {
            file: file.display().to_string(),
            period,
            status,
            output_dir: None,
            pages_extracted: Vec::new(),
            tables: BTreeMap::new(),
            error: None,
            extraction_metadata: None,
        }
    }

    fn failed(file: &Path, period: String, status: BatchStatus, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(file, period, status)
        }
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_pdfs: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchResult>,
}

impl BatchSummary {
    fn from_results(results: Vec<BatchResult>) -> Self {
        let successful = results.iter().filter(|r| r.status == BatchStatus::Ok).count();
        Self {
            total_pdfs: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }

    /// Periods in which each statement key was found.
    pub fn coverage(&self) -> BTreeMap<String, Vec<String>> {
        let mut coverage: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for result in &self.results {
            for key in result.tables.keys() {
                coverage.entry(key.clone()).or_default().push(result.period.clone());
            }
        }
        coverage
    }
}

/// PDF files directly inside `dir`, sorted by file name.
pub fn find_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(FintabError::Input(format!("{} is not a directory", dir.display())));
    }

    let mut pdfs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}

/// Runs the full pipeline over many reports, one at a time.
pub struct BatchProcessor {
    config: BatchConfig,
    scanner: PageScanner,
    extractor: TableExtractor,
}

impl BatchProcessor {
    /// Create a batch processor from the pipeline configuration.
    pub fn new(config: &FintabConfig) -> Self {
        Self {
            config: config.batch.clone(),
            scanner: PageScanner::new(config),
            extractor: TableExtractor::new(config),
        }
    }

    /// Process every PDF in `dir`.
    ///
    /// Tables land in `<output_base>/<period>_tables`, or next to each PDF
    /// when no base is given.
    pub fn process_dir(
        &self,
        dir: &Path,
        output_base: Option<&Path>,
        password: Option<&str>,
    ) -> Result<BatchSummary> {
        let pdfs = find_pdfs(dir)?;
        if pdfs.is_empty() {
            return Err(FintabError::Input(format!("no PDF files found in {}", dir.display())));
        }
        Ok(self.process_files(&pdfs, output_base, password, &mut |_, _| {}))
    }

    /// Process the given files in order. A failing file never stops the batch.
    pub fn process_files(
        &self,
        pdfs: &[PathBuf],
        output_base: Option<&Path>,
        password: Option<&str>,
        progress: Progress<'_>,
    ) -> BatchSummary {
        info!("Processing {} PDF report(s)", pdfs.len());

        let mut results = Vec::with_capacity(pdfs.len());
        for (done, pdf) in pdfs.iter().enumerate() {
            results.push(self.process_pdf(pdf, output_base, password));
            progress(done as u32 + 1, pdfs.len() as u32);
        }

        let summary = BatchSummary::from_results(results);
        info!(
            "Batch complete: {} successful, {} failed",
            summary.successful, summary.failed
        );
        summary
    }

    /// Run scan, page selection, extraction, and classification for one PDF.
    pub fn process_pdf(&self, pdf: &Path, output_base: Option<&Path>, password: Option<&str>) -> BatchResult {
        let period = derive_period(pdf);
        match PdfDocument::open(pdf, password) {
            Ok(doc) => self.process_document(&doc, pdf, output_base),
            Err(e) => {
                warn!("Could not open {}: {}", pdf.display(), e);
                BatchResult::failed(pdf, period, BatchStatus::ScanFailed, e.to_string())
            }
        }
    }

    /// Pipeline for a document that is already open.
    pub fn process_document<P: PdfProcessor>(
        &self,
        doc: &P,
        pdf: &Path,
        output_base: Option<&Path>,
    ) -> BatchResult {
        let period = derive_period(pdf);
        info!("Processing {} (period {})", pdf.display(), period);

        let scan = self.scanner.scan(doc);
        let pages = select_pages(&scan, &self.config);
        if pages.is_empty() {
            info!("No financial pages found in {}", pdf.display());
            return BatchResult::new(pdf, period, BatchStatus::NoFinancialPages);
        }
        debug!("Selected pages {:?}", pages);

        let base = match output_base {
            Some(base) => base.to_path_buf(),
            None => pdf.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let out_dir = base.join(format!("{}_tables", period));

        let outcome = self
            .extractor
            .extract(doc, &pages, &out_dir)
            .and_then(|mut metadata| {
                let tables = self.rename_tables(&out_dir, &period, &mut metadata, &scan)?;
                Ok((metadata, tables))
            });

        match outcome {
            Ok((metadata, tables)) => {
                info!(
                    "Found: {}",
                    if tables.is_empty() {
                        "none".to_string()
                    } else {
                        tables.keys().cloned().collect::<Vec<_>>().join(", ")
                    }
                );
                BatchResult {
                    output_dir: Some(out_dir.display().to_string()),
                    pages_extracted: pages,
                    tables: tables
                        .into_iter()
                        .map(|(k, v)| (k, v.display().to_string()))
                        .collect(),
                    extraction_metadata: Some(metadata),
                    ..BatchResult::new(pdf, period, BatchStatus::Ok)
                }
            }
            Err(e) => {
                warn!("Extraction failed for {}: {}", pdf.display(), e);
                BatchResult {
                    output_dir: Some(out_dir.display().to_string()),
                    pages_extracted: pages,
                    ..BatchResult::failed(pdf, period, BatchStatus::ExtractFailed, e.to_string())
                }
            }
        }
    }

    /// Rename `page_N_table_M.csv` files to `<type>_<period>.csv` and record
    /// the new names in the metadata.
    fn rename_tables(
        &self,
        out_dir: &Path,
        period: &str,
        metadata: &mut ExtractionMetadata,
        scan: &ScanReport,
    ) -> Result<BTreeMap<String, PathBuf>> {
        let mut used: HashSet<String> = HashSet::new();
        let mut classified = BTreeMap::new();

        for table in &mut metadata.tables {
            let path = out_dir.join(&table.file);
            let rows = read_csv(&path)?;

            let mut best = classify_rows(&rows, self.config.classify_rows);
            if best.is_none() {
                best = scan.page(table.page).and_then(classify_page);
            }

            let base = match best {
                Some((statement, score)) => {
                    debug!("{} classified as {} (score {})", table.file, statement, score);
                    table.statement = Some(statement.to_string());
                    statement.to_string()
                }
                None => table.file.trim_end_matches(".csv").to_string(),
            };

            let (name, key) = unique_name(&mut used, &base, period);
            let target = out_dir.join(&name);
            fs::rename(&path, &target)?;

            table.file = name;
            classified.insert(key, target);
        }

        write_metadata(metadata, out_dir)?;
        Ok(classified)
    }
}

/// `<base>_<period>.csv`, then `<base>_2_<period>.csv`, `<base>_3_<period>.csv`, ...
/// Returns the file name and the statement key.
fn unique_name(used: &mut HashSet<String>, base: &str, period: &str) -> (String, String) {
    let name = format!("{}_{}.csv", base, period);
    if used.insert(name.clone()) {
        return (name, base.to_string());
    }
    let mut counter = 2;
    loop {
        let key = format!("{}_{}", base, counter);
        let name = format!("{}_{}.csv", key, period);
        if used.insert(name.clone()) {
            return (name, key);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::read_metadata;
    use crate::pdf::{PageLayout, PdfType, TextChar};
    use crate::PdfError;
    use pretty_assertions::assert_eq;

    fn record(page: u32, tables: usize, keywords: &[&str]) -> PageRecord {
        PageRecord {
            page,
            tables,
            chars: 100,
            has_numbers: true,
            financial_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            preview: String::new(),
        }
    }

    fn report(pages: Vec<PageRecord>) -> ScanReport {
        ScanReport {
            file: "x.pdf".to_string(),
            total_pages: pages.len() as u32,
            pdf_type: PdfType::Text,
            financial_pages: vec![],
            financial_page_count: 0,
            suggestion: None,
            pages,
        }
    }

    #[test]
    fn test_derive_period() {
        assert_eq!(derive_period(Path::new("/r/3q25.pdf")), "3Q25");
        assert_eq!(derive_period(Path::new("1Q24_report.pdf")), "1Q24");
        assert_eq!(derive_period(Path::new("annual-2024.pdf")), "annual-2024");
    }

    #[test]
    fn test_classify_rows() {
        let rows = vec![
            vec!["Consolidated Income Statement".to_string(), String::new()],
            vec!["Rental income".to_string(), "100".to_string()],
        ];
        assert_eq!(classify_rows(&rows, 15), Some(("income_statement", 1)));

        let rows = vec![vec!["NOI".to_string(), "EBITDA".to_string()]];
        assert_eq!(classify_rows(&rows, 15).map(|(s, _)| s), Some("noi_ebitda"));

        let rows = vec![vec!["Occupancy".to_string(), "95%".to_string()]];
        assert_eq!(classify_rows(&rows, 15), None);
    }

    #[test]
    fn test_select_pages() {
        let config = BatchConfig::default();
        let scan = report(vec![
            record(1, 0, &["revenue", "income", "ebitda"]),
            record(2, 1, &["revenue", "income"]),
            record(3, 2, &["revenue", "income", "net income"]),
            record(4, 1, &["debt"]),
        ]);
        assert_eq!(select_pages(&scan, &config), vec![3, 2]);

        let scan = report(vec![record(1, 1, &["debt"]), record(2, 0, &[])]);
        assert_eq!(select_pages(&scan, &config), vec![1]);

        let capped = BatchConfig {
            max_pages: 1,
            ..BatchConfig::default()
        };
        let scan = report(vec![record(1, 1, &["a", "b"]), record(2, 1, &["a", "b"])]);
        assert_eq!(select_pages(&scan, &capped), vec![1]);
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();
        assert_eq!(
            unique_name(&mut used, "balance_sheet", "3Q25"),
            ("balance_sheet_3Q25.csv".to_string(), "balance_sheet".to_string())
        );
        assert_eq!(
            unique_name(&mut used, "balance_sheet", "3Q25"),
            ("balance_sheet_2_3Q25.csv".to_string(), "balance_sheet_2".to_string())
        );
        assert_eq!(unique_name(&mut used, "balance_sheet", "3Q25").1, "balance_sheet_3");
    }

    struct FakePdf(Vec<PageLayout>);

    impl PdfProcessor for FakePdf {
        fn source(&self) -> String {
            "/reports/3Q25.pdf".to_string()
        }

        fn page_count(&self) -> u32 {
            self.0.len() as u32
        }

        fn page_layout(&self, page: u32) -> crate::pdf::Result<PageLayout> {
            self.0.get(page as usize - 1).cloned().ok_or(PdfError::InvalidPage(page))
        }
    }

    fn line(text: &str, x: f64, baseline: f64) -> Vec<TextChar> {
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

    fn statement_page() -> PageLayout {
        let mut chars = line("Income Statement", 50.0, 60.0);
        for (row, baseline) in [("", 100.0), ("Revenue", 115.0), ("Net Income", 130.0)] {
            chars.extend(line(row, 50.0, baseline));
        }
        chars.extend(line("3Q25", 200.0, 100.0));
        chars.extend(line("3Q24", 300.0, 100.0));
        chars.extend(line("1,500", 200.0, 115.0));
        chars.extend(line("1,200", 300.0, 115.0));
        chars.extend(line("300", 200.0, 130.0));
        chars.extend(line("250", 300.0, 130.0));
        PageLayout {
            page: 1,
            width: 612.0,
            height: 792.0,
            chars,
            ..Default::default()
        }
    }

    #[test]
    fn test_process_document_renames_tables() {
        let dir = tempfile::tempdir().unwrap();
        let doc = FakePdf(vec![statement_page()]);
        let processor = BatchProcessor::new(&FintabConfig::default());

        let result = processor.process_document(&doc, Path::new("/reports/3Q25.pdf"), Some(dir.path()));
        assert_eq!(result.status, BatchStatus::Ok);
        assert_eq!(result.period, "3Q25");
        assert_eq!(result.pages_extracted, vec![1]);

        let out_dir = dir.path().join("3Q25_tables");
        assert!(out_dir.join("income_statement_3Q25.csv").is_file());
        assert!(!out_dir.join("page_1_table_1.csv").exists());
        assert!(result.tables.contains_key("income_statement"));

        let metadata = read_metadata(&out_dir).unwrap();
        assert_eq!(metadata.tables[0].file, "income_statement_3Q25.csv");
        assert_eq!(metadata.tables[0].statement.as_deref(), Some("income_statement"));
    }

    #[test]
    fn test_no_financial_pages() {
        let dir = tempfile::tempdir().unwrap();
        let doc = FakePdf(vec![PageLayout::default()]);
        let processor = BatchProcessor::new(&FintabConfig::default());

        let result = processor.process_document(&doc, Path::new("4Q24.pdf"), Some(dir.path()));
        assert_eq!(result.status, BatchStatus::NoFinancialPages);
        assert!(!dir.path().join("4Q24_tables").exists());
    }

    #[test]
    fn test_failures_do_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("1Q25.pdf");
        std::fs::write(&bad, b"not a pdf").unwrap();

        let processor = BatchProcessor::new(&FintabConfig::default());
        let summary = processor.process_files(
            &[bad, dir.path().join("2Q25.pdf")],
            None,
            None,
            &mut |_, _| {},
        );
        assert_eq!(summary.total_pdfs, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.results[1].status, BatchStatus::ScanFailed);
        assert_eq!(summary.results[1].period, "2Q25");
    }

    #[test]
    fn test_find_pdfs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["3Q25.pdf", "1Q25.PDF", "notes.txt", "2Q25.pdf"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<String> = find_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1Q25.PDF", "2Q25.pdf", "3Q25.pdf"]);
    }
}
