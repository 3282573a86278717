//! Row-total checks.

use rust_decimal::Decimal;

use crate::format::{cell_decimal, NumberFormat};
use crate::models::table::{RowCheck, RowStatus, ValidationSummary};

/// Label attached to every summary so readers do not mistake it for an audit.
pub const ROW_TOTAL_HEURISTIC: &str = "heuristic: last numeric cell compared with the sum of the \
     preceding numeric cells; period-comparison columns are expected to mismatch";

/// Check one row: with three or more numeric cells, the last one should
/// equal the sum of the others.
pub fn check_row(index: usize, row: &[String], format: NumberFormat) -> RowCheck {
    let nums: Vec<(String, Decimal)> = row.iter().filter_map(|c| cell_decimal(c, format)).collect();

    if nums.len() < 3 {
        return RowCheck {
            row: index,
            status: RowStatus::Skipped,
            expected: None,
            computed: None,
            diff: None,
            reason: Some("fewer than 3 numeric cells".to_string()),
        };
    }

    let (last, parts) = nums.split_last().map(|(l, p)| (l.1, p)).unwrap_or_default();
    let sum: Decimal = parts.iter().map(|(_, d)| *d).sum();

    let (status, diff) = if sum == last {
        (RowStatus::Pass, None)
    } else {
        (RowStatus::Mismatch, Some((sum - last).abs().to_string()))
    };

    RowCheck {
        row: index,
        status,
        expected: Some(last.to_string()),
        computed: Some(sum.to_string()),
        diff,
        reason: None,
    }
}

/// Check every row of a table and summarize.
pub fn validate_rows(rows: &[Vec<String>], format: NumberFormat) -> ValidationSummary {
    let mut summary = ValidationSummary {
        heuristic: ROW_TOTAL_HEURISTIC.to_string(),
        ..Default::default()
    };

    for (i, row) in rows.iter().enumerate() {
        let check = check_row(i, row, format);
        summary.rows_checked += 1;
        match check.status {
            RowStatus::Pass => summary.rows_pass += 1,
            RowStatus::Mismatch => {
                summary.rows_mismatch += 1;
                summary.details.push(check);
            }
            RowStatus::Skipped => summary.rows_skipped += 1,
        }
    }

    summary
}
