//! Cross-period combining of batch output into one CSV per statement type.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::batch::STATEMENT_TYPES;
use crate::error::{FintabError, Result};
use crate::extract::{read_csv, write_csv};
use crate::format::is_financial_cell;
use crate::patterns::QUARTER;

const TABLES_SUFFIX: &str = "_tables";

lazy_static! {
    static ref TRAILING_NOTE: Regex = Regex::new(r"\s*\(\d+\)\s*$").unwrap();
    static ref TRAILING_NET: Regex = Regex::new(r"(?i)\s*\(net\)\s*$").unwrap();
    static ref NON_OPERATING: Regex = Regex::new(r"non[- ]operati(?:ng|on)").unwrap();
    static ref PORTFOLIO: Regex = Regex::new(r"\s*\((?:own|consolidated)\s*portfolio\)").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Ordering key for a period label: `(year, quarter)`, unknown labels last.
pub fn period_sort_key(period: &str) -> (u32, u32) {
    let upper = period.to_uppercase();
    QUARTER
        .captures(&upper)
        .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0))
        .and_then(|caps| Some((caps[2].parse().ok()?, caps[1].parse().ok()?)))
        .unwrap_or((99, 99))
}

/// Label key used to line up the same item across periods.
pub fn normalize_label(label: &str) -> String {
    let s = label.trim().to_lowercase();
    let s = TRAILING_NOTE.replace(&s, "");
    let s = TRAILING_NET.replace(&s, "");
    let s = NON_OPERATING.replace_all(&s, "non operating");
    let s = s.trim_end_matches(['.', ':', ';']);
    let s = WHITESPACE.replace_all(s, " ");
    let s = s.trim_start_matches(['$', '•', '·', '-', ' ']);
    PORTFOLIO.replace_all(s, "").trim().to_string()
}

/// Index of the first row that names a period.
fn find_header_row(rows: &[Vec<String>]) -> Option<usize> {
    rows.iter().position(|row| {
        let joined = row.join(" ");
        let lower = joined.to_lowercase();
        QUARTER.is_match(&joined)
            || (lower.contains("thousand") && lower.contains("pesos"))
    })
}

/// Column whose header names `period`. `2Q25` and `2T25` are the same period.
fn find_period_column(header: &[String], period: &str) -> Option<usize> {
    let upper = period.to_uppercase();
    let spanish = upper.replace('Q', "T");
    header.iter().position(|cell| {
        let cell: String = cell.to_uppercase().chars().filter(|c| !c.is_whitespace()).collect();
        cell.contains(&upper) || cell.contains(&spanish)
    })
}

/// `(label, value)` pairs of one period's statement, values verbatim.
///
/// Values come from the column headed by the period when there is one,
/// otherwise from the first financial cell of each row.
pub fn period_values(rows: &[Vec<String>], period: &str) -> Vec<(String, String)> {
    let header = find_header_row(rows);
    let column = header.and_then(|h| find_period_column(&rows[h], period));
    let body = match (header, column) {
        (Some(h), Some(_)) => &rows[h + 1..],
        _ => rows,
    };

    let mut pairs = Vec::new();
    for row in body {
        let label = match row.first().map(|c| c.trim()) {
            Some(l) if !l.is_empty() => l,
            _ => match row.get(1).map(|c| c.trim()) {
                Some(l) if !l.is_empty() && !is_financial_cell(l) => l,
                _ => continue,
            },
        };
        if is_financial_cell(label) {
            continue;
        }
        // Narrative that leaked into the grid.
        if label.chars().count() > 60 && label.contains(' ') {
            continue;
        }

        let value = match column {
            Some(col) => row.get(col).map(|c| c.trim()).unwrap_or(""),
            None => row
                .iter()
                .skip(1)
                .map(|c| c.trim())
                .find(|c| is_financial_cell(c))
                .unwrap_or(""),
        };
        pairs.push((label.to_string(), value.to_string()));
    }
    pairs
}

/// One combined statement written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedStatement {
    pub file: String,
    pub periods: Vec<String>,
    pub line_items: usize,
}

/// Result of a combine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineSummary {
    /// Every period found, in chronological order.
    pub periods: Vec<String>,

    /// Statement type to its combined file.
    pub statements: BTreeMap<String, CombinedStatement>,
}

/// Line items of one statement type, in first-seen order.
#[derive(Default)]
struct StatementGrid {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    values: HashMap<(usize, String), String>,
    periods: Vec<String>,
}

impl StatementGrid {
    fn add_period(&mut self, period: &str, pairs: Vec<(String, String)>) {
        self.periods.push(period.to_string());

        // Repeated labels in one period (e.g. two "Total" rows) stay distinct.
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (label, value) in pairs {
            let base = normalize_label(&label);
            let n = seen.entry(base.clone()).or_insert(0);
            *n += 1;
            let key = if *n == 1 { base } else { format!("{}#{}", base, n) };

            let row = match self.index.get(&key) {
                Some(&row) => row,
                None => {
                    self.labels.push(label);
                    self.index.insert(key, self.labels.len() - 1);
                    self.labels.len() - 1
                }
            };
            self.values.entry((row, period.to_string())).or_insert(value);
        }
    }

    fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(self.labels.len() + 1);
        let mut header = vec!["line_item".to_string()];
        header.extend(self.periods.iter().cloned());
        rows.push(header);

        for (i, label) in self.labels.iter().enumerate() {
            let mut row = vec![label.clone()];
            for period in &self.periods {
                row.push(self.values.get(&(i, period.clone())).cloned().unwrap_or_default());
            }
            rows.push(row);
        }
        rows
    }
}

/// Merges `<period>_tables/` directories into cross-period statements.
#[derive(Debug, Default)]
pub struct Combiner;

impl Combiner {
    pub fn new() -> Self {
        Self
    }

    /// `(period, directory)` for every `<period>_tables` directory under
    /// `parent`, in chronological order.
    pub fn period_dirs(&self, parent: &Path) -> Result<Vec<(String, PathBuf)>> {
        if !parent.is_dir() {
            return Err(FintabError::Input(format!("{} is not a directory", parent.display())));
        }

        let mut dirs: Vec<(String, PathBuf)> = fs::read_dir(parent)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?;
                let period = name.strip_suffix(TABLES_SUFFIX)?.to_string();
                Some((period, p))
            })
            .collect();
        dirs.sort_by(|a, b| {
            period_sort_key(&a.0)
                .cmp(&period_sort_key(&b.0))
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(dirs)
    }

    /// Write `combined_<type>.csv` into `out_dir` for every statement type
    /// found under `parent`.
    pub fn combine(&self, parent: &Path, out_dir: &Path) -> Result<CombineSummary> {
        let dirs = self.period_dirs(parent)?;
        if dirs.is_empty() {
            return Err(FintabError::Input(format!(
                "no *{} directories found in {}",
                TABLES_SUFFIX,
                parent.display()
            )));
        }
        info!("Combining {} period(s) from {}", dirs.len(), parent.display());

        let mut statements = BTreeMap::new();
        for &statement in STATEMENT_TYPES {
            let mut grid = StatementGrid::default();
            for (period, dir) in &dirs {
                let path = dir.join(format!("{}_{}.csv", statement, period));
                if !path.is_file() {
                    continue;
                }
                let rows = read_csv(&path)?;
                let pairs = period_values(&rows, period);
                debug!("{}: {} line items for {}", statement, pairs.len(), period);
                grid.add_period(period, pairs);
            }
            if grid.periods.is_empty() {
                continue;
            }

            fs::create_dir_all(out_dir)?;
            let file = format!("combined_{}.csv", statement);
            write_csv(&out_dir.join(&file), &grid.rows())?;
            statements.insert(
                statement.to_string(),
                CombinedStatement {
                    file,
                    line_items: grid.labels.len(),
                    periods: grid.periods,
                },
            );
        }

        Ok(CombineSummary {
            periods: dirs.into_iter().map(|(p, _)| p).collect(),
            statements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect()
    }

    #[test]
    fn test_period_sort_key() {
        let mut periods = vec!["1Q25", "4T24", "annual", "2Q24"];
        periods.sort_by_key(|p| period_sort_key(p));
        assert_eq!(periods, vec!["2Q24", "4T24", "1Q25", "annual"]);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Net Income (1)"), "net income");
        assert_eq!(normalize_label("Other non-operation income:"), "other non operating income");
        assert_eq!(normalize_label("• Rental   income (Net)"), "rental income");
        assert_eq!(normalize_label("NOI (own portfolio)"), "noi");
    }

    #[test]
    fn test_period_values_from_header_column() {
        let table = rows(&[
            &["", "3T25", "3T24", "Var %"],
            &["Revenue", "1,500.0", "1,200.0", "25.0%"],
            &["Net Income", "(300)", "250", "n.a."],
        ]);
        assert_eq!(
            period_values(&table, "3Q25"),
            vec![
                ("Revenue".to_string(), "1,500.0".to_string()),
                ("Net Income".to_string(), "(300)".to_string()),
            ]
        );
    }

    #[test]
    fn test_period_values_first_numeric_fallback() {
        let table = rows(&[&["Revenue", "", "1,500"], &["Note on revenue", "", ""]]);
        assert_eq!(
            period_values(&table, "3Q25"),
            vec![
                ("Revenue".to_string(), "1,500".to_string()),
                ("Note on revenue".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_combine_periods() {
        let parent = tempfile::tempdir().unwrap();
        for (period, revenue, extra) in [("3Q25", "1,500", None), ("2Q25", "1,400", Some("12"))] {
            let dir = parent.path().join(format!("{}_tables", period));
            std::fs::create_dir(&dir).unwrap();
            let mut data = vec![
                vec!["".to_string(), period.to_string()],
                vec!["Revenue".to_string(), revenue.to_string()],
            ];
            if let Some(extra) = extra {
                data.push(vec!["Other income (1)".to_string(), extra.to_string()]);
            }
            write_csv(&dir.join(format!("income_statement_{}.csv", period)), &data).unwrap();
        }

        let out = parent.path().join("combined");
        let summary = Combiner::new().combine(parent.path(), &out).unwrap();
        assert_eq!(summary.periods, vec!["2Q25", "3Q25"]);
        assert_eq!(summary.statements.len(), 1);
        assert_eq!(summary.statements["income_statement"].line_items, 2);

        let combined = read_csv(&out.join("combined_income_statement.csv")).unwrap();
        assert_eq!(
            combined,
            rows(&[
                &["line_item", "2Q25", "3Q25"],
                &["Revenue", "1,400", "1,500"],
                &["Other income (1)", "12", ""],
            ])
        );
    }

    #[test]
    fn test_combine_without_period_dirs() {
        let parent = tempfile::tempdir().unwrap();
        let err = Combiner::new().combine(parent.path(), parent.path()).unwrap_err();
        assert!(matches!(err, FintabError::Input(_)));
    }
}
