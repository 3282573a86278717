//! Number format, scale, and currency inference.
//!
//! Everything here reports what a document uses. Nothing rewrites cell
//! contents: normalized strings are only used transiently for checks.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::patterns::{
    CURRENCY_PREFIX, EN_GROUPED_DECIMAL, EN_GROUPED_END, ES_GROUPED_DECIMAL, ES_GROUPED_END,
    EUR_MARKER, FINANCIAL_CELL, MXN_MARKER, PARENTHETICAL_NEG, PLAIN_NUMBER, USD_MARKER,
};

/// Decimal and thousands separator convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberFormat {
    /// `1,234.56`
    #[default]
    En,
    /// `1.234,56`
    Es,
}

impl NumberFormat {
    /// Human-readable description.
    pub fn describe(&self) -> &'static str {
        match self {
            NumberFormat::En => "English (1,234.56)",
            NumberFormat::Es => "Spanish (1.234,56)",
        }
    }
}

/// Multiplier label printed near a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Thousands,
    Millions,
}

/// A detected scale and the phrase it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleMatch {
    pub scale: Scale,
    pub token: String,
}

lazy_static! {
    // Most specific phrases first.
    static ref SCALE_PATTERNS: Vec<(Regex, Scale)> = [
        (r"millones\s+de\s+pesos", Scale::Millions),
        (r"miles\s+de\s+pesos", Scale::Thousands),
        (r"millions\s+of\s+pesos", Scale::Millions),
        (r"thousands\s+of\s+pesos", Scale::Thousands),
        (r"\ben\s+millones\b", Scale::Millions),
        (r"\ben\s+miles\b", Scale::Thousands),
        (r"\bin\s+millions\b", Scale::Millions),
        (r"\bin\s+thousands\b", Scale::Thousands),
        (r"\bmillones\b", Scale::Millions),
        (r"\bmillions\b", Scale::Millions),
        (r"\bmiles\b", Scale::Thousands),
        (r"\bthousands\b", Scale::Thousands),
    ]
    .into_iter()
    .map(|(pattern, scale)| (Regex::new(&format!("(?i){}", pattern)).unwrap(), scale))
    .collect();

    static ref SEPARATORS: Regex = Regex::new(r"[()\u{2212}\u{2013}-]").unwrap();
}

/// Count `(english, spanish)` separator evidence over cells.
pub fn number_format_evidence<'a>(cells: impl IntoIterator<Item = &'a str>) -> (usize, usize) {
    let mut en = 0usize;
    let mut es = 0usize;

    for cell in cells {
        let cleaned = CURRENCY_PREFIX.replace(cell, "");
        let cleaned = SEPARATORS.replace_all(cleaned.trim(), "");
        let cleaned = cleaned.trim();

        if EN_GROUPED_DECIMAL.is_match(cleaned) {
            en += 1;
        } else if ES_GROUPED_DECIMAL.is_match(cleaned) {
            es += 1;
        } else if EN_GROUPED_END.is_match(cleaned) && !cleaned.contains('.') {
            en += 1;
        } else if ES_GROUPED_END.is_match(cleaned) && !cleaned.contains(',') {
            es += 1;
        }
    }

    (en, es)
}

/// Pick a convention from separator evidence.
///
/// Ties, including no evidence at all, resolve to English.
pub fn detect_number_format<'a>(cells: impl IntoIterator<Item = &'a str>) -> NumberFormat {
    let (en, es) = number_format_evidence(cells);
    if es > en {
        NumberFormat::Es
    } else {
        NumberFormat::En
    }
}

/// Normalize a cell to a plain number string (`-1234.5`), or `None` if the
/// cell is not a number.
///
/// Currency prefixes are dropped, parenthetical and dash negatives become a
/// leading minus, and a lone dash means zero. The result is a string; it is
/// never parsed into a binary float.
pub fn normalize_number_string(raw: &str, format: NumberFormat) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let s = s.replace(['\u{2212}', '\u{2013}', '\u{2014}'], "-");
    if s == "-" {
        return Some("0".to_string());
    }
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut s = CURRENCY_PREFIX.replace(&s, "").trim().to_string();

    let mut negative = false;
    let inner = PARENTHETICAL_NEG
        .captures(&s)
        .map(|caps| caps[1].trim().to_string());
    if let Some(inner) = inner {
        s = inner;
        negative = true;
    }
    let unsigned = s
        .strip_prefix('-')
        .map(|rest| CURRENCY_PREFIX.replace(rest.trim(), "").trim().to_string());
    if let Some(unsigned) = unsigned {
        s = unsigned;
        negative = true;
    }

    let mut s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    match format {
        NumberFormat::Es => {
            s = s.replace('.', "").replace(',', ".");
        }
        NumberFormat::En => {
            s = s.replace(',', "");
        }
    }

    if !PLAIN_NUMBER.is_match(&s) {
        return None;
    }

    Some(if negative { format!("-{}", s) } else { s })
}

/// Exact decimal value of a cell, for transient arithmetic only.
pub fn cell_decimal(raw: &str, format: NumberFormat) -> Option<(String, Decimal)> {
    let normalized = normalize_number_string(raw, format)?;
    let value = Decimal::from_str(&normalized).ok()?;
    Some((normalized, value))
}

/// Whether a cell holds an amount, percentage, or currency value.
pub fn is_financial_cell(cell: &str) -> bool {
    let s = cell.trim();
    !s.is_empty() && FINANCIAL_CELL.is_match(s)
}

/// Find the first scale phrase in the text.
pub fn detect_scale(text: &str) -> Option<ScaleMatch> {
    SCALE_PATTERNS.iter().find_map(|(pattern, scale)| {
        pattern.find(text).map(|m| ScaleMatch {
            scale: *scale,
            token: m.as_str().to_lowercase(),
        })
    })
}

/// Detect the reporting currency from text context.
///
/// Peso markers win over dollar markers, since Mexican filings quote both.
pub fn detect_currency(text: &str) -> Option<String> {
    if MXN_MARKER.is_match(text) {
        Some("MXN".to_string())
    } else if USD_MARKER.is_match(text) {
        Some("USD".to_string())
    } else if EUR_MARKER.is_match(text) {
        Some("EUR".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_number_format() {
        assert_eq!(detect_number_format(["1,234.56", "2,000", "abc"]), NumberFormat::En);
        assert_eq!(detect_number_format(["1.234,56", "Ps. 2.000", "3"]), NumberFormat::Es);
        assert_eq!(detect_number_format(["12", "7"]), NumberFormat::En);
    }

    #[test]
    fn test_normalize_en() {
        let n = |s| normalize_number_string(s, NumberFormat::En);
        assert_eq!(n("1,234.50"), Some("1234.50".to_string()));
        assert_eq!(n("(1,234)"), Some("-1234".to_string()));
        assert_eq!(n("$ 300"), Some("300".to_string()));
        assert_eq!(n("US$1,000.0"), Some("1000.0".to_string()));
        assert_eq!(n("\u{2212}45"), Some("-45".to_string()));
        assert_eq!(n("-"), Some("0".to_string()));
        assert_eq!(n("\u{2013}"), Some("0".to_string()));
        assert_eq!(n("12.5%"), None);
        assert_eq!(n("Revenue"), None);
        assert_eq!(n("3Q25"), None);
    }

    #[test]
    fn test_normalize_es() {
        let n = |s| normalize_number_string(s, NumberFormat::Es);
        assert_eq!(n("1.234,56"), Some("1234.56".to_string()));
        assert_eq!(n("Ps. 12.345"), Some("12345".to_string()));
        assert_eq!(n("(2.000,5)"), Some("-2000.5".to_string()));
    }

    #[test]
    fn test_trailing_zeros_survive() {
        let (normalized, value) = cell_decimal("1,200.50", NumberFormat::En).unwrap();
        assert_eq!(normalized, "1200.50");
        assert_eq!(value.to_string(), "1200.50");
    }

    #[test]
    fn test_detect_scale() {
        let m = detect_scale("Cifras en millones de pesos").unwrap();
        assert_eq!(m.scale, Scale::Millions);
        assert_eq!(m.token, "millones de pesos");

        let m = detect_scale("(Figures in Thousands)").unwrap();
        assert_eq!(m.scale, Scale::Thousands);
        assert_eq!(m.token, "in thousands");

        assert!(detect_scale("Revenue grew").is_none());
    }

    #[test]
    fn test_detect_currency() {
        assert_eq!(detect_currency("Ps. 1,000 (US$ 50)"), Some("MXN".to_string()));
        assert_eq!(detect_currency("USD millions"), Some("USD".to_string()));
        assert_eq!(detect_currency("capex grew"), None);
    }
}
