//! Page scanner: a compact map of where financial content lives in a PDF.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::models::config::{FintabConfig, ScanConfig};
use crate::models::page::{PageRecord, ScanReport};
use crate::pdf::layout::{plain_text, text_lines};
use crate::pdf::{LayoutOptions, PageLayout, PdfProcessor, PdfType};
use crate::table::TableDetector;

/// English financial vocabulary.
pub const KEYWORDS_EN: &[&str] = &[
    "revenue", "income", "ebitda", "noi", "net operating income",
    "balance sheet", "cash flow", "total assets", "total liabilities",
    "equity", "earnings", "depreciation", "amortization", "capex",
    "capital expenditure", "operating expenses", "gross profit",
    "net income", "dividends", "distributions", "occupancy",
    "rental income", "interest expense", "debt", "leverage",
    "loan to value", "ltv", "ffo", "affo", "funds from operations",
    "fair value", "investment properties", "gla", "sqm", "sq ft",
];

/// Spanish financial vocabulary.
pub const KEYWORDS_ES: &[&str] = &[
    "ingresos", "estado de resultados", "estado de posición financiera",
    "balance general", "flujo de efectivo", "utilidad neta",
    "utilidad de operación", "activos totales", "pasivos totales",
    "capital contable", "depreciación", "amortización",
    "gastos de operación", "ingreso por rentas", "gasto por intereses",
    "deuda", "propiedades de inversión", "ocupación",
    "resultado integral", "distribuciones", "certificados",
    "cbfis", "fibra", "fideicomiso", "arrendamiento",
    "millones de pesos", "miles de pesos",
];

lazy_static! {
    static ref BUILTIN_PATTERNS: Vec<(String, Regex)> = KEYWORDS_EN
        .iter()
        .chain(KEYWORDS_ES)
        .map(|kw| (kw.to_string(), keyword_regex(kw)))
        .collect();
}

fn keyword_regex(keyword: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword))).unwrap()
}

/// Callback invoked as `(page, total)` after each page is processed.
pub type Progress<'a> = &'a mut dyn FnMut(u32, u32);

/// Walks every page, counting tables and matching financial keywords.
pub struct PageScanner {
    config: ScanConfig,
    layout: LayoutOptions,
    detector: TableDetector,
    extra: Vec<(String, Regex)>,
}

impl PageScanner {
    /// Create a scanner from the pipeline configuration.
    pub fn new(config: &FintabConfig) -> Self {
        let extra = config
            .scan
            .extra_keywords
            .iter()
            .map(|kw| kw.trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .map(|kw| {
                let re = keyword_regex(&kw);
                (kw, re)
            })
            .collect();

        Self {
            config: config.scan.clone(),
            layout: config.tables.layout_options(),
            detector: TableDetector::new(config.tables.clone()),
            extra,
        }
    }

    /// Keywords found in the text, in vocabulary order.
    pub fn match_keywords(&self, text: &str) -> Vec<String> {
        BUILTIN_PATTERNS
            .iter()
            .chain(&self.extra)
            .filter(|(_, re)| re.is_match(text))
            .map(|(kw, _)| kw.clone())
            .collect()
    }

    /// First non-empty lines joined by ` | `, truncated with `...`.
    pub fn preview(&self, text: &str) -> String {
        let preview = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(self.config.preview_lines)
            .collect::<Vec<_>>()
            .join(" | ");

        if preview.chars().count() > self.config.preview_chars {
            let cut: String = preview.chars().take(self.config.preview_chars).collect();
            format!("{}...", cut)
        } else {
            preview
        }
    }

    /// Build the record for one page.
    ///
    /// `fallback` is used as the page text when the layout has no glyphs.
    pub fn scan_page(&self, layout: &PageLayout, fallback: Option<&str>) -> PageRecord {
        let lines = text_lines(layout, &self.layout);
        let mut text = plain_text(&lines);
        if text.trim().is_empty() {
            if let Some(fallback) = fallback {
                text = fallback.trim().to_string();
            }
        }

        let tables = self.detector.detect_lines(layout, &lines).count();

        PageRecord {
            page: layout.page,
            tables,
            chars: text.chars().count(),
            has_numbers: text.chars().any(|c| c.is_ascii_digit()),
            financial_keywords: self.match_keywords(&text),
            preview: self.preview(&text),
        }
    }

    /// Scan every page of a document.
    pub fn scan<P: PdfProcessor>(&self, doc: &P) -> ScanReport {
        self.scan_with_progress(doc, &mut |_, _| {})
    }

    /// Scan every page, reporting progress after each one.
    pub fn scan_with_progress<P: PdfProcessor>(&self, doc: &P, progress: Progress<'_>) -> ScanReport {
        let total = doc.page_count();
        info!("Scanning {} pages of {}", total, doc.source());

        let mut fallback: Option<Option<Vec<String>>> = None;
        let mut pages = Vec::with_capacity(total as usize);
        let mut images = 0usize;
        let mut text_chars = 0usize;

        for page in 1..=total {
            let layout = match doc.page_layout(page) {
                Ok(layout) => layout,
                Err(e) => {
                    warn!("Page {}: {}", page, e);
                    PageLayout {
                        page,
                        ..Default::default()
                    }
                }
            };

            let fallback_text = if layout.chars.is_empty() {
                fallback
                    .get_or_insert_with(|| doc.fallback_text())
                    .as_ref()
                    .and_then(|pages| pages.get(page as usize - 1))
                    .map(String::as_str)
            } else {
                None
            };

            let record = self.scan_page(&layout, fallback_text);
            debug!(
                "Page {}: {} table(s), {} keyword(s)",
                page,
                record.tables,
                record.financial_keywords.len()
            );

            images += layout.images;
            if record.chars >= self.config.min_text_chars {
                text_chars += record.chars;
            }
            pages.push(record);
            progress(page, total);
        }

        let pdf_type = PdfType::classify(text_chars, images);
        let financial_pages: Vec<u32> = pages
            .iter()
            .filter(|p| p.is_financial())
            .map(|p| p.page)
            .collect();

        let suggestion = if !pdf_type.has_text_layer() && pages.iter().all(|p| p.tables == 0) {
            Some(
                "No extractable text layer found; the document looks scanned. \
                 Run OCR on it before extracting tables."
                    .to_string(),
            )
        } else if financial_pages.is_empty() {
            Some(
                "No tables or financial keywords found. \
                 Check that this is a financial report."
                    .to_string(),
            )
        } else {
            None
        };

        info!(
            "Found {} financial page(s) out of {}",
            financial_pages.len(),
            total
        );

        ScanReport {
            file: doc.source(),
            total_pages: total,
            pdf_type,
            financial_page_count: financial_pages.len(),
            financial_pages,
            suggestion,
            pages,
        }
    }
}
