//! PDF loading using lopdf, with pdf-extract as a secondary text source.

use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::content::PageInterpreter;
use super::font::number;
use super::{PageLayout, PdfProcessor, Result};
use crate::error::PdfError;

/// US Letter, used when no MediaBox is found.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// A loaded PDF document.
pub struct PdfDocument {
    source: PathBuf,
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfDocument {
    /// Open a PDF from disk, decrypting with `password` (or the empty password).
    pub fn open(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PdfError::NotFound(path.to_path_buf()));
        }
        let data = std::fs::read(path).map_err(|e| PdfError::Parse(e.to_string()))?;
        let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::from_bytes(&data, absolute, password)
    }

    /// Load a PDF from memory. `source` is only used for reporting.
    pub fn from_bytes(data: &[u8], source: impl AsRef<Path>, password: Option<&str>) -> Result<Self> {
        let mut doc = Document::load_mem(data).map_err(|e| {
            let message = e.to_string();
            let lower = message.to_lowercase();
            if lower.contains("encrypt") || lower.contains("password") || lower.contains("decrypt") {
                PdfError::Encrypted
            } else {
                PdfError::Parse(message)
            }
        })?;

        let raw_data = if doc.is_encrypted() {
            if doc.decrypt(password.unwrap_or("")).is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF {}", source.as_ref().display());
            doc.trailer.remove(b"Encrypt");

            // Save decrypted document so pdf-extract sees plain streams
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }
        debug!("Loaded PDF with {} pages", page_count);

        Ok(Self {
            source: source.as_ref().to_path_buf(),
            document: doc,
            raw_data,
        })
    }

    /// Path the document was loaded from.
    pub fn path(&self) -> &Path {
        &self.source
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.document
            .get_pages()
            .get(&page)
            .copied()
            .ok_or(PdfError::InvalidPage(page))
    }

    fn media_box(&self, page_id: ObjectId) -> [f64; 4] {
        let Some(Object::Array(values)) = inherited(&self.document, page_id, b"MediaBox") else {
            return DEFAULT_MEDIA_BOX;
        };
        let v: Vec<f64> = values
            .iter()
            .filter_map(|o| self.document.dereference(o).ok().and_then(|(_, o)| number(o)))
            .collect();
        if v.len() != 4 {
            return DEFAULT_MEDIA_BOX;
        }
        [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])]
    }

    fn resources(&self, page_id: ObjectId) -> Option<Dictionary> {
        match inherited(&self.document, page_id, b"Resources")? {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }
}

impl PdfProcessor for PdfDocument {
    fn source(&self) -> String {
        self.source.display().to_string()
    }

    fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    fn page_layout(&self, page: u32) -> Result<PageLayout> {
        let page_id = self.page_id(page)?;
        let media_box = self.media_box(page_id);
        let resources = self.resources(page_id);

        let content = self
            .document
            .get_page_content(page_id)
            .map_err(|e| PdfError::Content {
                page,
                reason: e.to_string(),
            })?;

        PageInterpreter::new(&self.document, page, media_box).run(
            &content,
            resources.as_ref(),
            media_box,
        )
    }

    fn fallback_text(&self) -> Option<Vec<String>> {
        let text = match pdf_extract::extract_text_from_mem(&self.raw_data) {
            Ok(text) => text,
            Err(e) => {
                warn!("pdf-extract failed on {}: {}", self.source.display(), e);
                return None;
            }
        };

        let mut pages: Vec<String> = text.split('\u{000C}').map(str::to_string).collect();
        if pages.last().is_some_and(String::is_empty) {
            pages.pop();
        }

        if pages.len() != self.page_count() as usize {
            debug!(
                "pdf-extract returned {} page breaks for {} pages, not using it",
                pages.len(),
                self.page_count()
            );
            return None;
        }
        Some(pages)
    }
}

/// Look up a page attribute, following `Parent` links for inherited values.
fn inherited(doc: &Document, node_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(node_id);
    let mut hops = 0;

    while let Some(id) = current {
        let Ok(Object::Dictionary(dict)) = doc.get_object(id) else {
            return None;
        };

        if let Ok(value) = dict.get(key) {
            if let Ok((_, resolved)) = doc.dereference(value) {
                return Some(resolved.clone());
            }
        }

        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => Some(*parent_id),
            _ => None,
        };

        // Malformed trees can loop.
        hops += 1;
        if hops > 64 {
            return None;
        }
    }
    None
}
