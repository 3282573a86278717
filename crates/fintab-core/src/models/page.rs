//! Page scan records.

use serde::{Deserialize, Serialize};

use crate::pdf::PdfType;

/// Lightweight metadata for one page, emitted by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page number (1-indexed).
    pub page: u32,

    /// Number of detected table regions (best detection strategy).
    pub tables: usize,

    /// Length of the extracted page text in characters.
    pub chars: usize,

    /// Whether the page text contains any digits.
    pub has_numbers: bool,

    /// Matched financial keywords, in vocabulary order.
    pub financial_keywords: Vec<String>,

    /// First lines of the page joined with ` | `.
    pub preview: String,
}

impl PageRecord {
    /// Whether the page looks like it carries financial content.
    pub fn is_financial(&self) -> bool {
        self.tables > 0 || !self.financial_keywords.is_empty()
    }
}

/// Result of scanning a whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Absolute path of the scanned file.
    pub file: String,

    /// Number of pages in the document.
    pub total_pages: u32,

    /// Overall content classification.
    pub pdf_type: PdfType,

    /// Pages with tables or financial keywords.
    pub financial_pages: Vec<u32>,

    /// Count of `financial_pages`.
    pub financial_page_count: usize,

    /// Hint for the caller when the result is empty or image-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// One record per page, in page order.
    pub pages: Vec<PageRecord>,
}

impl ScanReport {
    /// Look up the record for a page.
    pub fn page(&self, page: u32) -> Option<&PageRecord> {
        self.pages.iter().find(|p| p.page == page)
    }
}
