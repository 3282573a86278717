//! Page selection parsing.

use std::collections::BTreeSet;

use crate::error::PageSpecError;

/// Highest page number a selection may name.
pub const MAX_PAGE: u32 = 100_000;

/// Parse `5,6,7`, `5-10` or `5,8-12` into a sorted, de-duplicated list.
pub fn parse_page_spec(spec: &str) -> Result<Vec<u32>, PageSpecError> {
    let mut pages = BTreeSet::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_page(start, part)?;
            let end = parse_page(end, part)?;
            if end < start {
                return Err(PageSpecError::ReversedRange(start, end));
            }
            pages.extend(start..=end);
        } else {
            pages.insert(parse_page(part, part)?);
        }
    }

    if pages.is_empty() {
        return Err(PageSpecError::Empty);
    }

    Ok(pages.into_iter().collect())
}

fn parse_page(s: &str, token: &str) -> Result<u32, PageSpecError> {
    let page: u32 = s
        .trim()
        .parse()
        .map_err(|_| PageSpecError::InvalidToken(token.to_string()))?;
    if page == 0 {
        return Err(PageSpecError::Zero);
    }
    if page > MAX_PAGE {
        return Err(PageSpecError::TooLarge(page, MAX_PAGE));
    }
    Ok(page)
}
