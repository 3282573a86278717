//! Core library for financial PDF table extraction.
//!
//! This crate provides:
//! - PDF loading and page layout interpretation (glyph positions, ruling lines)
//! - A page scanner that maps financial content across a document
//! - Table detection, presentation-artifact cleaning, and CSV extraction
//! - Number format, scale, and currency inference plus row-total checks
//! - Layout-preserving text extraction for cross-validation
//! - Batch processing and cross-period combining of extracted statements

pub mod error;
pub mod models;
pub mod patterns;
pub mod pdf;
pub mod scan;
pub mod table;
pub mod format;
pub mod validate;
pub mod extract;
pub mod crossval;
pub mod batch;
pub mod combine;

pub use error::{FintabError, PageSpecError, PdfError, Result};
pub use models::config::FintabConfig;
pub use models::page::{PageRecord, ScanReport};
pub use models::table::{ExtractionMetadata, TableSummary};
pub use models::text::{PageText, TextReport, ValidationReport};
pub use pdf::{PageLayout, PdfDocument, PdfProcessor, PdfType};
pub use scan::PageScanner;
pub use table::{RawTable, TableDetector, TableStrategy};
pub use format::NumberFormat;
pub use extract::TableExtractor;
pub use crossval::TextExtractor;
pub use batch::BatchProcessor;
pub use combine::Combiner;
