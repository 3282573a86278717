//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};

use crate::pdf::LayoutOptions;

/// Main configuration for the fintab pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FintabConfig {
    /// Page scanner configuration.
    pub scan: ScanConfig,

    /// Table detection configuration.
    pub tables: TableConfig,

    /// Artifact cleaning configuration.
    pub cleaning: CleaningConfig,

    /// Batch page selection configuration.
    pub batch: BatchConfig,
}

/// Page scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of non-empty lines in a page preview.
    pub preview_lines: usize,

    /// Maximum preview length in characters before truncation.
    pub preview_chars: usize,

    /// Additional keywords matched alongside the built-in vocabulary.
    pub extra_keywords: Vec<String>,

    /// Minimum characters for a page to count as having a text layer.
    pub min_text_chars: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            preview_lines: 5,
            preview_chars: 300,
            extra_keywords: Vec::new(),
            min_text_chars: 1,
        }
    }
}

/// Table detection configuration.
///
/// Distances are in PDF points unless the name says ratio, in which case
/// they are multiplied by the local font size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Horizontal gap (ratio of font size) above which glyphs start a new word.
    pub word_gap_ratio: f64,

    /// Vertical distance within which glyphs share a text line.
    pub y_tolerance: f64,

    /// Horizontal gap (ratio of font size) that separates table columns.
    pub column_gap_ratio: f64,

    /// Maximum vertical gap between rows (ratio of line height) inside one table.
    pub max_row_gap_ratio: f64,

    /// Minimum rows with two or more cells for a text-aligned table.
    pub min_rows: usize,

    /// Minimum columns for any detected table.
    pub min_columns: usize,

    /// Distance within which ruling lines are snapped and joined.
    pub snap_tolerance: f64,

    /// Ruling segments shorter than this are ignored.
    pub min_rule_length: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            word_gap_ratio: 0.15,
            y_tolerance: 3.0,
            column_gap_ratio: 1.0,
            max_row_gap_ratio: 2.5,
            min_rows: 2,
            min_columns: 2,
            snap_tolerance: 3.0,
            min_rule_length: 3.0,
        }
    }
}

impl TableConfig {
    /// Glyph grouping options derived from this configuration.
    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            word_gap_ratio: self.word_gap_ratio,
            y_tolerance: self.y_tolerance,
        }
    }
}

/// Presentation-artifact cleaning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Share of non-empty cells that must look like RGB channel values
    /// before a leading column is stripped.
    pub artifact_ratio: f64,

    /// Share of empty cells above which a number-free column is merged
    /// into the label column before it.
    pub continuation_empty_ratio: f64,

    /// Copy the last seen row label into rows whose first cell is empty.
    pub forward_fill_labels: bool,

    /// Rows whose joined text is longer than this are treated as narrative.
    pub max_row_text_len: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            artifact_ratio: 0.7,
            continuation_empty_ratio: 0.5,
            forward_fill_labels: true,
            max_row_text_len: 200,
        }
    }
}

/// Batch page selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum pages extracted per document.
    pub max_pages: usize,

    /// Minimum keyword matches for a page with tables to be selected.
    pub min_keywords: usize,

    /// Number of leading CSV rows read when classifying a statement.
    pub classify_rows: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_pages: 15,
            min_keywords: 2,
            classify_rows: 15,
        }
    }
}

impl FintabConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: FintabConfig =
            serde_json::from_str(r#"{"cleaning": {"artifact_ratio": 0.9}}"#).unwrap();
        assert_eq!(config.cleaning.artifact_ratio, 0.9);
        assert!(config.cleaning.forward_fill_labels);
        assert_eq!(config.batch.max_pages, 15);
        assert_eq!(config.scan.preview_lines, 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = FintabConfig::default();
        config.tables.min_rows = 4;
        config.save(&path).unwrap();

        let loaded = FintabConfig::from_file(&path).unwrap();
        assert_eq!(loaded.tables.min_rows, 4);
    }
}
