//! Filters that strip presentation artifacts from a raw cell grid.
//!
//! Slide decks exported to PDF leave debris in table regions: color swatch
//! values rendered as text, labels wrapped into a neighbouring column,
//! spacer rows, and bullet or footnote text inside the table box. Each
//! filter below handles one of these and can be used on its own.

use std::collections::BTreeSet;

use tracing::trace;

use crate::format::is_financial_cell;
use crate::models::config::CleaningConfig;
use crate::models::table::CleaningStats;
use crate::patterns::FOOTNOTE_MARKER;

/// A grid of optional cell strings.
pub type Grid = Vec<Vec<Option<String>>>;

const BULLETS: [char; 3] = ['\u{25AA}', '\u{2022}', '\u{25CF}'];

/// A table after every cleaning filter ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedTable {
    pub rows: Vec<Vec<String>>,
    pub footnotes: Vec<String>,
    pub stats: CleaningStats,
}

fn text(cell: &Option<String>) -> &str {
    cell.as_deref().map(str::trim).unwrap_or("")
}

fn width(grid: &Grid) -> usize {
    grid.iter().map(Vec::len).max().unwrap_or(0)
}

fn column<'a>(grid: &'a Grid, idx: usize) -> impl Iterator<Item = &'a str> + 'a {
    grid.iter().map(move |row| row.get(idx).map(text).unwrap_or(""))
}

/// Whether a cell looks like an RGB/CMYK channel value from a color swatch:
/// a single integer in [0, 255], or three or four of them.
///
/// Two-part values such as `1,234` are thousands-grouped numbers, and a
/// zero-padded part such as `000` is a thousands group, not a channel.
pub fn is_rgb_artifact(cell: &str) -> bool {
    let s = cell.trim().trim_end_matches(',').trim();
    if s.is_empty() {
        return true;
    }

    let parts: Vec<&str> = s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if !matches!(parts.len(), 1 | 3 | 4) {
        return false;
    }

    parts.iter().all(|p| {
        p.chars().all(|c| c.is_ascii_digit())
            && !(p.len() > 1 && p.starts_with('0'))
            && p.parse::<u32>().is_ok_and(|v| v <= 255)
    })
}

/// Number of leading columns that are empty or mostly color artifacts.
///
/// Never covers the whole grid.
pub fn artifact_columns(grid: &Grid, ratio: f64) -> usize {
    let cols = width(grid);
    let mut strip = 0;

    for idx in 0..cols {
        let values: Vec<&str> = column(grid, idx).filter(|v| !v.is_empty()).collect();
        if values.is_empty() {
            strip += 1;
            continue;
        }
        let artifacts = values.iter().filter(|v| is_rgb_artifact(v)).count();
        if artifacts as f64 / values.len() as f64 > ratio {
            strip += 1;
        } else {
            break;
        }
    }

    if strip >= cols { 0 } else { strip }
}

/// Drop the first `count` columns.
pub fn strip_leading_columns(grid: Grid, count: usize) -> Grid {
    if count == 0 {
        return grid;
    }
    grid.into_iter()
        .map(|row| row.into_iter().skip(count).collect())
        .collect()
}

/// Columns that hold wrapped label text: no amounts and mostly empty.
pub fn continuation_columns(grid: &Grid, empty_ratio: f64) -> BTreeSet<usize> {
    let rows = grid.len();
    let mut merge = BTreeSet::new();
    if rows == 0 {
        return merge;
    }

    for idx in 1..width(grid) {
        let values: Vec<&str> = column(grid, idx).filter(|v| !v.is_empty()).collect();
        if values.is_empty() {
            continue;
        }
        let financial = values.iter().filter(|v| is_financial_cell(v)).count();
        let empty = 1.0 - values.len() as f64 / rows as f64;
        if financial == 0 && empty > empty_ratio {
            merge.insert(idx);
        }
    }

    merge
}

/// Merge each listed column into the nearest unlisted column to its left.
pub fn merge_columns(grid: Grid, merge: &BTreeSet<usize>) -> Grid {
    if merge.is_empty() {
        return grid;
    }

    grid.into_iter()
        .map(|mut row| {
            for &idx in merge {
                if idx == 0 || idx >= row.len() {
                    continue;
                }
                let mut target = idx - 1;
                while target > 0 && merge.contains(&target) {
                    target -= 1;
                }

                let addition = text(&row[idx]).to_string();
                let current = text(&row[target]).to_string();
                if !addition.is_empty() {
                    row[target] = Some(join_fragments(&current, &addition));
                }
                row[idx] = None;
            }
            row.into_iter()
                .enumerate()
                .filter(|(i, _)| !merge.contains(i))
                .map(|(_, cell)| cell)
                .collect()
        })
        .collect()
}

/// Join two label fragments, without a space when a word was split.
fn join_fragments(current: &str, addition: &str) -> String {
    if current.is_empty() {
        return addition.to_string();
    }
    let split_word = current.chars().last().is_some_and(char::is_alphabetic)
        && addition.chars().next().is_some_and(char::is_lowercase);
    if split_word {
        format!("{}{}", current, addition)
    } else {
        format!("{} {}", current, addition)
    }
}

/// Remove rows without any text. Returns the count removed.
pub fn drop_empty_rows(grid: Grid) -> (Grid, usize) {
    let before = grid.len();
    let kept: Grid = grid
        .into_iter()
        .filter(|row| row.iter().any(|c| !text(c).is_empty()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Copy the last row label into rows whose first cell is empty.
pub fn forward_fill_labels(grid: &mut Grid) {
    let mut last: Option<String> = None;
    for row in grid.iter_mut() {
        let Some(first) = row.first_mut() else { continue };
        if text(first).is_empty() {
            if let Some(label) = &last {
                *first = Some(label.clone());
            }
        } else {
            last = first.clone();
        }
    }
}

/// Whether a row is a footnote or narrative bullet rather than table data.
pub fn is_footnote_row(row: &[Option<String>], max_text_len: usize) -> bool {
    let cells: Vec<&str> = row.iter().map(text).filter(|c| !c.is_empty()).collect();
    let Some(first) = cells.first() else {
        return true;
    };
    if FOOTNOTE_MARKER.is_match(first) {
        return true;
    }
    if cells.join(" ").chars().count() > max_text_len {
        return true;
    }
    cells.iter().any(|c| c.contains(BULLETS))
}

/// Run every filter in order: strip artifact columns, merge continuation
/// columns, drop spacer rows, forward-fill labels, move footnotes out.
pub fn clean_table(raw: &Grid, config: &CleaningConfig) -> CleanedTable {
    let mut stats = CleaningStats::default();

    let strip = artifact_columns(raw, config.artifact_ratio);
    stats.artifact_columns = strip;
    let grid = strip_leading_columns(raw.clone(), strip);

    let merge = continuation_columns(&grid, config.continuation_empty_ratio);
    stats.merged_columns = merge.len();
    let grid = merge_columns(grid, &merge);

    let (mut grid, empty) = drop_empty_rows(grid);
    stats.empty_rows = empty;

    if config.forward_fill_labels {
        forward_fill_labels(&mut grid);
    }

    let mut rows = Vec::with_capacity(grid.len());
    let mut footnotes = Vec::new();
    for row in grid {
        if is_footnote_row(&row, config.max_row_text_len) {
            let joined = row
                .iter()
                .map(text)
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if !joined.is_empty() {
                footnotes.push(joined);
            }
        } else {
            rows.push(row.iter().map(|c| text(c).to_string()).collect());
        }
    }
    stats.footnote_rows = footnotes.len();

    trace!(
        "Cleaned table: {} artifact col(s), {} merged col(s), {} empty row(s), {} footnote(s)",
        stats.artifact_columns,
        stats.merged_columns,
        stats.empty_rows,
        stats.footnote_rows
    );

    CleanedTable { rows, footnotes, stats }
}
