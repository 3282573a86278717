//! Common regex patterns for financial statement text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Currency markers in front of an amount
    pub static ref CURRENCY_PREFIX: Regex = Regex::new(
        r"^\s*(?:Ps\.?\s*|MXN\s*|USD\s*|US\$\s*|\$\s*)"
    ).unwrap();

    // Accounting negatives: (1,234)
    pub static ref PARENTHETICAL_NEG: Regex = Regex::new(
        r"^\s*\(\s*([\d,.\s]+)\s*\)\s*$"
    ).unwrap();

    pub static ref PLAIN_NUMBER: Regex = Regex::new(r"^\d+\.?\d*$").unwrap();

    // Number format evidence
    pub static ref EN_GROUPED_DECIMAL: Regex = Regex::new(r"\d,\d{3}\.").unwrap();
    pub static ref ES_GROUPED_DECIMAL: Regex = Regex::new(r"\d\.\d{3},").unwrap();
    pub static ref EN_GROUPED_END: Regex = Regex::new(r"\d,\d{3}$").unwrap();
    pub static ref ES_GROUPED_END: Regex = Regex::new(r"\d\.\d{3}$").unwrap();

    // A cell that holds an amount, percentage, or currency value
    pub static ref FINANCIAL_CELL: Regex = Regex::new(
        r"^[\s($\-\u{2212}\u{2013}]*\d[\d,.\s]*[)%]?$"
    ).unwrap();

    // Footnote markers at the start of a row: "1)", "2.", "*", "(3)"
    pub static ref FOOTNOTE_MARKER: Regex = Regex::new(
        r"^\s*(?:\d{1,2}\s*[).](?:\s|$)|[*\u{2020}\u{2021}\u{a7}\u{b9}\u{b2}\u{b3}\u{2074}\u{2075}]|\(\d\))"
    ).unwrap();

    // Number-like strings in page text, with optional currency and parentheses
    pub static ref TEXT_NUMBER: Regex = Regex::new(
        r"[($]?\s*(?:Ps\.?\s*)?\$?\s*\d{1,3}(?:[,.]\d{3})*(?:[.,]\d{1,2})?\s*\)?"
    ).unwrap();

    // Reporting period in a file name: 3Q25
    pub static ref PERIOD: Regex = Regex::new(r"(\d[Qq]\d{2})").unwrap();

    // Quarter label for ordering, English (Q) or Spanish (T) spelling
    pub static ref QUARTER: Regex = Regex::new(r"(\d)[QqTt](\d{2})").unwrap();

    // Currency evidence
    pub static ref MXN_MARKER: Regex = Regex::new(r"(?i)\bps\.|\bpesos\b|\bmxn\b").unwrap();
    pub static ref USD_MARKER: Regex = Regex::new(r"(?i)\busd\b|\bus\$|\bdollars?\b").unwrap();
    pub static ref EUR_MARKER: Regex = Regex::new(r"(?i)\beur\b|\beuros?\b|€").unwrap();
}
