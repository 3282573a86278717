//! PDF processing module.

mod content;
mod document;
mod font;
pub mod layout;

pub use document::PdfDocument;
pub use layout::{LayoutOptions, TextLine, Word};

use serde::{Deserialize, Serialize};

use crate::error::PdfError;

/// Type of PDF content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfType {
    /// Contains extractable text.
    Text,
    /// Contains only images (scanned document).
    Image,
    /// Contains both text and images.
    Hybrid,
    /// Empty or unreadable.
    Empty,
}

impl PdfType {
    /// Classify from the amount of extracted text and embedded images.
    pub fn classify(text_chars: usize, images: usize) -> Self {
        let has_text = text_chars > 50;
        let has_images = images > 0;
        match (has_text, has_images) {
            (true, false) => PdfType::Text,
            (false, true) => PdfType::Image,
            (true, true) => PdfType::Hybrid,
            (false, false) => PdfType::Empty,
        }
    }

    /// Whether text extraction can work on this document.
    pub fn has_text_layer(&self) -> bool {
        matches!(self, PdfType::Text | PdfType::Hybrid)
    }
}

/// A single positioned glyph.
///
/// Coordinates use a top-left origin, in points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChar {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    pub bottom: f64,
    /// Effective font size on the page.
    pub size: f64,
}

impl TextChar {
    /// Whether the glyph renders as blank space.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An axis-aligned ruling segment from a stroked or filled path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl Rule {
    /// Build a rule from two endpoints, keeping only axis-aligned segments.
    pub fn between(a: (f64, f64), b: (f64, f64)) -> Option<Self> {
        let rule = Rule {
            x0: a.0.min(b.0),
            x1: a.0.max(b.0),
            top: a.1.min(b.1),
            bottom: a.1.max(b.1),
        };
        if rule.is_horizontal() || rule.is_vertical() {
            Some(rule)
        } else {
            None
        }
    }

    pub fn is_horizontal(&self) -> bool {
        (self.bottom - self.top) < 1.0 && (self.x1 - self.x0) >= 1.0
    }

    pub fn is_vertical(&self) -> bool {
        (self.x1 - self.x0) < 1.0 && (self.bottom - self.top) >= 1.0
    }

    pub fn length(&self) -> f64 {
        (self.x1 - self.x0).max(self.bottom - self.top)
    }
}

/// Everything the table detector and text renderer need from one page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// Page number (1-indexed).
    pub page: u32,
    pub width: f64,
    pub height: f64,
    pub chars: Vec<TextChar>,
    pub rules: Vec<Rule>,
    /// Image XObjects painted on the page.
    pub images: usize,
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF access implementations.
pub trait PdfProcessor {
    /// Path or name reported in outputs.
    fn source(&self) -> String;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Interpret a page (1-indexed) into positioned glyphs and rules.
    fn page_layout(&self, page: u32) -> Result<PageLayout>;

    /// Plain per-page text from a secondary extractor, if it can split pages.
    fn fallback_text(&self) -> Option<Vec<String>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_type_classify() {
        assert_eq!(PdfType::classify(500, 0), PdfType::Text);
        assert_eq!(PdfType::classify(0, 3), PdfType::Image);
        assert_eq!(PdfType::classify(500, 3), PdfType::Hybrid);
        assert_eq!(PdfType::classify(10, 0), PdfType::Empty);
        assert!(!PdfType::Image.has_text_layer());
    }

    #[test]
    fn test_rule_orientation() {
        let h = Rule::between((10.0, 50.0), (200.0, 50.0)).unwrap();
        assert!(h.is_horizontal());
        let v = Rule::between((10.0, 50.0), (10.0, 120.0)).unwrap();
        assert!(v.is_vertical());
        assert!(Rule::between((0.0, 0.0), (20.0, 20.0)).is_none());
    }
}
