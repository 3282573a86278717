//! Error types for the fintab-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the fintab library.
#[derive(Error, Debug)]
pub enum FintabError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Invalid page selection.
    #[error("page selection error: {0}")]
    PageSpec(#[from] PageSpecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A directory argument did not contain what the operation needs.
    #[error("invalid input: {0}")]
    Input(String),
}

impl FintabError {
    /// Whether this error means the document needs a password.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, FintabError::Pdf(PdfError::Encrypted))
    }
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The input file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be opened with the given password.
    #[error("PDF is password-protected; provide the password or use an unlocked copy")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// A page content stream could not be interpreted.
    #[error("failed to read content of page {page}: {reason}")]
    Content { page: u32, reason: String },
}

/// Errors from parsing page selections such as `5,8-12`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageSpecError {
    /// The selection was empty.
    #[error("empty page selection")]
    Empty,

    /// A part was not a number or range.
    #[error("invalid page token: {0:?}")]
    InvalidToken(String),

    /// Page numbers are 1-indexed.
    #[error("page numbers start at 1")]
    Zero,

    /// Range end before start.
    #[error("reversed page range: {0}-{1}")]
    ReversedRange(u32, u32),

    /// Page number beyond any real document.
    #[error("page {0} is beyond the maximum of {1}")]
    TooLarge(u32, u32),
}

/// Result type for the fintab library.
pub type Result<T> = std::result::Result<T, FintabError>;
