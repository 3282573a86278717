//! Tables bounded by ruling lines.

use crate::models::config::TableConfig;
use crate::pdf::{Rule, TextLine, Word};

use super::{RawTable, TableStrategy};

/// Find grids formed by connected horizontal and vertical rules.
pub(super) fn detect(rules: &[Rule], lines: &[TextLine], config: &TableConfig) -> Vec<RawTable> {
    let rules: Vec<Rule> = rules
        .iter()
        .filter(|r| r.length() >= config.min_rule_length)
        .copied()
        .collect();
    if rules.len() < 4 {
        return Vec::new();
    }

    let words: Vec<&Word> = lines.iter().flat_map(|l| &l.words).collect();

    let mut tables: Vec<RawTable> = connected_groups(&rules, config.snap_tolerance)
        .into_iter()
        .filter_map(|group| grid_table(&group, &words, config))
        .collect();

    tables.sort_by(|a, b| a.bbox[1].total_cmp(&b.bbox[1]).then(a.bbox[0].total_cmp(&b.bbox[0])));
    tables
}

/// Partition rules into groups that touch within `tolerance`.
fn connected_groups(rules: &[Rule], tolerance: f64) -> Vec<Vec<Rule>> {
    let mut parent: Vec<usize> = (0..rules.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..rules.len() {
        for j in (i + 1)..rules.len() {
            if touches(&rules[i], &rules[j], tolerance) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<Rule>)> = Vec::new();
    for (i, rule) in rules.iter().enumerate() {
        let root = find(&mut parent, i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, group)) => group.push(*rule),
            None => groups.push((root, vec![*rule])),
        }
    }
    groups.into_iter().map(|(_, g)| g).collect()
}

fn touches(a: &Rule, b: &Rule, tolerance: f64) -> bool {
    a.x0 - tolerance <= b.x1
        && b.x0 - tolerance <= a.x1
        && a.top - tolerance <= b.bottom
        && b.top - tolerance <= a.bottom
}

/// Sorted positions with near-duplicates collapsed.
fn snap(mut values: Vec<f64>, tolerance: f64) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    let mut out: Vec<f64> = Vec::new();
    for v in values {
        match out.last() {
            Some(last) if v - last <= tolerance => {}
            _ => out.push(v),
        }
    }
    out
}

fn grid_table(group: &[Rule], words: &[&Word], config: &TableConfig) -> Option<RawTable> {
    let horizontal: Vec<&Rule> = group.iter().filter(|r| r.is_horizontal()).collect();
    let vertical: Vec<&Rule> = group.iter().filter(|r| r.is_vertical()).collect();
    if horizontal.len() < 2 || vertical.len() < 2 {
        return None;
    }

    let tol = config.snap_tolerance;
    let ys = snap(horizontal.iter().map(|r| (r.top + r.bottom) / 2.0).collect(), tol);
    let xs = snap(vertical.iter().map(|r| (r.x0 + r.x1) / 2.0).collect(), tol);
    if ys.len() < 2 || xs.len() < 2 {
        return None;
    }

    let n_rows = ys.len() - 1;
    let n_cols = xs.len() - 1;
    if n_rows * n_cols < 2 {
        return None;
    }

    let mut cells: Vec<Vec<Vec<&Word>>> = vec![vec![Vec::new(); n_cols]; n_rows];
    for &word in words {
        let (cx, cy) = (word.center_x(), word.center_y());
        let Some(col) = slot(&xs, cx) else { continue };
        let Some(row) = slot(&ys, cy) else { continue };
        cells[row][col].push(word);
    }

    let rows: Vec<Vec<Option<String>>> = cells
        .into_iter()
        .map(|row| row.into_iter().map(|cell| cell_text(&cell)).collect())
        .collect();

    let filled = rows.iter().flatten().filter(|c| c.is_some()).count();
    if filled < 2 || n_cols < config.min_columns {
        return None;
    }

    Some(RawTable {
        bbox: [xs[0], ys[0], xs[n_cols], ys[n_rows]],
        strategy: TableStrategy::Lines,
        rows,
    })
}

/// Index of the interval of `edges` containing `v`.
fn slot(edges: &[f64], v: f64) -> Option<usize> {
    edges.windows(2).position(|w| v >= w[0] && v < w[1])
}

/// Words of one cell, already in reading order.
fn cell_text(words: &[&Word]) -> Option<String> {
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(text: &str, x0: f64, bottom: f64) -> Word {
        Word {
            text: text.to_string(),
            x0,
            x1: x0 + 5.0 * text.len() as f64,
            top: bottom - 8.0,
            bottom,
            size: 8.0,
        }
    }

    fn line(words: Vec<Word>) -> TextLine {
        let top = words.iter().map(|w| w.top).fold(f64::INFINITY, f64::min);
        let bottom = words.iter().map(|w| w.bottom).fold(0.0, f64::max);
        TextLine { words, top, bottom }
    }

    /// A 3x2 grid spanning x 100..300 and y 100..160.
    fn grid_rules() -> Vec<Rule> {
        let mut rules = Vec::new();
        for y in [100.0, 120.0, 140.0, 160.0] {
            rules.push(Rule { x0: 100.0, x1: 300.0, top: y, bottom: y });
        }
        for x in [100.0, 200.0, 300.0] {
            rules.push(Rule { x0: x, x1: x, top: 100.0, bottom: 160.0 });
        }
        rules
    }

    #[test]
    fn test_grid_cells() {
        let lines = vec![
            line(vec![word("Revenue", 105.0, 115.0), word("1,200", 205.0, 115.0)]),
            line(vec![word("Net", 105.0, 135.0), word("Income", 125.0, 135.0), word("300", 205.0, 135.0)]),
            line(vec![word("Outside", 400.0, 135.0)]),
        ];
        let tables = detect(&grid_rules(), &lines, &TableConfig::default());

        assert_eq!(tables.len(), 1);
        let t = &tables[0];
        assert_eq!(t.bbox, [100.0, 100.0, 300.0, 160.0]);
        assert_eq!(
            t.rows,
            vec![
                vec![Some("Revenue".to_string()), Some("1,200".to_string())],
                vec![Some("Net Income".to_string()), Some("300".to_string())],
                vec![None, None],
            ]
        );
    }

    #[test]
    fn test_lone_rectangle_is_not_a_table() {
        let rules = vec![
            Rule { x0: 0.0, x1: 100.0, top: 0.0, bottom: 0.0 },
            Rule { x0: 0.0, x1: 100.0, top: 50.0, bottom: 50.0 },
            Rule { x0: 0.0, x1: 0.0, top: 0.0, bottom: 50.0 },
            Rule { x0: 100.0, x1: 100.0, top: 0.0, bottom: 50.0 },
        ];
        let lines = vec![line(vec![word("Title", 10.0, 20.0), word("2024", 60.0, 20.0)])];
        assert!(detect(&rules, &lines, &TableConfig::default()).is_empty());
    }

    #[test]
    fn test_separate_grids() {
        let mut rules = grid_rules();
        for r in grid_rules() {
            rules.push(Rule { top: r.top + 300.0, bottom: r.bottom + 300.0, ..r });
        }
        let lines = vec![
            line(vec![word("a", 105.0, 115.0), word("1", 205.0, 115.0)]),
            line(vec![word("b", 105.0, 415.0), word("2", 205.0, 415.0)]),
        ];
        let tables = detect(&rules, &lines, &TableConfig::default());
        assert_eq!(tables.len(), 2);
        assert!(tables[0].bbox[1] < tables[1].bbox[1]);
    }
}
