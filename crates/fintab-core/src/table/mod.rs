//! Table region detection.
//!
//! Two strategies run on every page: one follows ruling lines drawn on the
//! page, the other infers columns from text alignment. The extractor keeps
//! whichever produced more non-empty cells.

pub mod clean;
mod alignment;
mod ruling;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::config::TableConfig;
use crate::pdf::{layout, PageLayout, TextLine};

/// How a table region was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStrategy {
    /// Grid formed by ruling lines.
    Lines,
    /// Columns inferred from aligned text.
    Text,
}

impl std::fmt::Display for TableStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableStrategy::Lines => write!(f, "lines"),
            TableStrategy::Text => write!(f, "text"),
        }
    }
}

/// A detected table as a grid of optional cell strings.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Bounds (x0, top, x1, bottom), top-left origin.
    pub bbox: [f64; 4],
    pub strategy: TableStrategy,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Cells holding non-blank text.
    pub fn non_empty_cells(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .filter(|c| c.as_deref().is_some_and(|s| !s.trim().is_empty()))
            .count()
    }

    /// Widest row.
    pub fn columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Tables found by each strategy on one page.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub lines: Vec<RawTable>,
    pub text: Vec<RawTable>,
}

impl Detection {
    /// Number of table regions, taking the strategy that found more.
    pub fn count(&self) -> usize {
        self.lines.len().max(self.text.len())
    }

    /// Tables from the strategy with the most non-empty cells.
    ///
    /// Ties go to the ruling-line strategy.
    pub fn best(self) -> Vec<RawTable> {
        let cells = |tables: &[RawTable]| tables.iter().map(RawTable::non_empty_cells).sum::<usize>();
        if cells(&self.text) > cells(&self.lines) {
            self.text
        } else {
            self.lines
        }
    }
}

/// Finds table regions on a page layout.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableConfig,
}

impl TableDetector {
    /// Create a detector with the given configuration.
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    /// Run every strategy on the page.
    pub fn detect(&self, page: &PageLayout) -> Detection {
        let lines = layout::text_lines(page, &self.config.layout_options());
        self.detect_lines(page, &lines)
    }

    /// Run every strategy on already grouped text lines.
    pub fn detect_lines(&self, page: &PageLayout, lines: &[TextLine]) -> Detection {
        let detection = Detection {
            lines: ruling::detect(&page.rules, lines, &self.config),
            text: alignment::detect(lines, &self.config),
        };

        debug!(
            "Page {}: {} ruled table(s), {} text-aligned table(s)",
            page.page,
            detection.lines.len(),
            detection.text.len()
        );

        detection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(strategy: TableStrategy, cells: &[&[&str]]) -> RawTable {
        RawTable {
            bbox: [0.0; 4],
            strategy,
            rows: cells
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|c| (!c.is_empty()).then(|| c.to_string()))
                        .collect()
                })
                .collect(),
        }
    }

    #[test]
    fn test_best_strategy_by_cell_count() {
        let detection = Detection {
            lines: vec![table(TableStrategy::Lines, &[&["a", ""], &["", "1"]])],
            text: vec![table(TableStrategy::Text, &[&["a", "2"], &["b", "1"]])],
        };
        assert_eq!(detection.count(), 1);

        let best = detection.best();
        assert_eq!(best[0].strategy, TableStrategy::Text);
        assert_eq!(best[0].non_empty_cells(), 4);
    }

    #[test]
    fn test_tie_prefers_lines() {
        let detection = Detection {
            lines: vec![table(TableStrategy::Lines, &[&["a", "1"]])],
            text: vec![table(TableStrategy::Text, &[&["a", "1"]])],
        };
        assert_eq!(detection.best()[0].strategy, TableStrategy::Lines);
    }
}
