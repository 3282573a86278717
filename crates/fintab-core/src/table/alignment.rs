//! Tables inferred from text alignment, for pages without ruling lines.

use crate::models::config::TableConfig;
use crate::pdf::TextLine;

use super::{RawTable, TableStrategy};

/// Words of a line separated from their neighbours by a column-sized gap.
#[derive(Debug, Clone)]
struct Chunk {
    text: String,
    x0: f64,
    x1: f64,
}

fn chunks(line: &TextLine, gap_ratio: f64) -> Vec<Chunk> {
    let mut out: Vec<Chunk> = Vec::new();
    for word in &line.words {
        match out.last_mut() {
            Some(chunk) if word.x0 - chunk.x1 <= gap_ratio * word.size => {
                chunk.text.push(' ');
                chunk.text.push_str(&word.text);
                chunk.x1 = chunk.x1.max(word.x1);
            }
            _ => out.push(Chunk {
                text: word.text.clone(),
                x0: word.x0,
                x1: word.x1,
            }),
        }
    }
    out
}

pub(super) fn detect(lines: &[TextLine], config: &TableConfig) -> Vec<RawTable> {
    let chunked: Vec<Vec<Chunk>> = lines
        .iter()
        .map(|l| chunks(l, config.column_gap_ratio))
        .collect();

    let close_enough = |prev: usize, next: usize| {
        let gap = lines[next].top - lines[prev].bottom;
        gap <= config.max_row_gap_ratio * lines[prev].height()
    };

    let mut blocks: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();

    for i in 0..lines.len() {
        if let Some(&prev) = current.last() {
            if !close_enough(prev, i) {
                blocks.push(std::mem::take(&mut current));
            }
        }

        if chunked[i].len() >= 2 {
            current.push(i);
            continue;
        }

        // A label-only row (section heading) may sit between tabular rows.
        let next_is_tabular = i + 1 < lines.len()
            && chunked[i + 1].len() >= 2
            && close_enough(i, i + 1);
        if !current.is_empty() && next_is_tabular {
            current.push(i);
        } else if !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
        .into_iter()
        .filter_map(|block| block_table(&block, lines, &chunked, config))
        .collect()
}

fn block_table(
    block: &[usize],
    lines: &[TextLine],
    chunked: &[Vec<Chunk>],
    config: &TableConfig,
) -> Option<RawTable> {
    let tabular: Vec<usize> = block.iter().copied().filter(|&i| chunked[i].len() >= 2).collect();
    if tabular.len() < config.min_rows {
        return None;
    }

    let columns = column_ranges(tabular.iter().flat_map(|&i| &chunked[i]));
    if columns.len() < config.min_columns {
        return None;
    }

    let rows: Vec<Vec<Option<String>>> = block
        .iter()
        .map(|&i| {
            let mut row: Vec<Option<String>> = vec![None; columns.len()];
            for chunk in &chunked[i] {
                let col = best_column(&columns, chunk);
                row[col] = Some(match row[col].take() {
                    Some(existing) => format!("{} {}", existing, chunk.text),
                    None => chunk.text.clone(),
                });
            }
            row
        })
        .collect();

    let first = lines[block[0]].top;
    let last = lines[block[block.len() - 1]].bottom;
    Some(RawTable {
        bbox: [columns[0].0, first, columns[columns.len() - 1].1, last],
        strategy: TableStrategy::Text,
        rows,
    })
}

/// Union of overlapping chunk extents, left to right.
fn column_ranges<'a>(chunks: impl Iterator<Item = &'a Chunk>) -> Vec<(f64, f64)> {
    let mut spans: Vec<(f64, f64)> = chunks.map(|c| (c.x0, c.x1)).collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::new();
    for (x0, x1) in spans {
        match merged.last_mut() {
            Some(last) if x0 <= last.1 => last.1 = last.1.max(x1),
            _ => merged.push((x0, x1)),
        }
    }
    merged
}

fn best_column(columns: &[(f64, f64)], chunk: &Chunk) -> usize {
    let overlap = |c: &(f64, f64)| (chunk.x1.min(c.1) - chunk.x0.max(c.0)).max(0.0);
    let center = (chunk.x0 + chunk.x1) / 2.0;
    let distance = |c: &(f64, f64)| (center - (c.0 + c.1) / 2.0).abs();

    let mut best = 0;
    for (i, col) in columns.iter().enumerate().skip(1) {
        let (o, bo) = (overlap(col), overlap(&columns[best]));
        if o > bo || (o == 0.0 && bo == 0.0 && distance(col) < distance(&columns[best])) {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::Word;
    use pretty_assertions::assert_eq;

    /// One line of words placed at the given x positions, 5pt per character.
    fn line(bottom: f64, words: &[(&str, f64)]) -> TextLine {
        let words: Vec<Word> = words
            .iter()
            .map(|(text, x0)| Word {
                text: text.to_string(),
                x0: *x0,
                x1: x0 + 5.0 * text.chars().count() as f64,
                top: bottom - 10.0,
                bottom,
                size: 10.0,
            })
            .collect();
        TextLine { words, top: bottom - 10.0, bottom }
    }

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_aligned_block() {
        let lines = vec![
            line(80.0, &[("Income", 50.0), ("Statement", 85.0)]),
            line(120.0, &[("3Q25", 200.0), ("3Q24", 300.0)]),
            line(135.0, &[("Revenue", 50.0), ("1,500", 200.0), ("1,200", 300.0)]),
            line(150.0, &[("Operating", 50.0)]),
            line(165.0, &[("Net", 50.0), ("Income", 70.0), ("300", 205.0), ("250", 305.0)]),
            line(400.0, &[("Footer", 50.0), ("text", 85.0)]),
        ];
        let tables = detect(&lines, &TableConfig::default());

        assert_eq!(tables.len(), 1);
        let t = &tables[0];
        assert_eq!(t.strategy, TableStrategy::Text);
        assert_eq!(
            t.rows,
            vec![
                vec![None, s("3Q25"), s("3Q24")],
                vec![s("Revenue"), s("1,500"), s("1,200")],
                vec![s("Operating"), None, None],
                vec![s("Net Income"), s("300"), s("250")],
            ]
        );
        assert_eq!(t.bbox[1], 110.0);
        assert_eq!(t.bbox[3], 165.0);
    }

    #[test]
    fn test_prose_is_not_a_table() {
        let lines = vec![
            line(100.0, &[("The", 50.0), ("company", 70.0), ("grew", 110.0)]),
            line(115.0, &[("revenue", 50.0), ("by", 90.0), ("ten", 105.0)]),
        ];
        assert!(detect(&lines, &TableConfig::default()).is_empty());
    }

    #[test]
    fn test_large_gap_splits_blocks() {
        let lines = vec![
            line(100.0, &[("a", 50.0), ("1", 200.0)]),
            line(115.0, &[("b", 50.0), ("2", 200.0)]),
            line(500.0, &[("c", 50.0), ("3", 200.0)]),
            line(515.0, &[("d", 50.0), ("4", 200.0)]),
        ];
        assert_eq!(detect(&lines, &TableConfig::default()).len(), 2);
    }
}
