use std::sync::LazyLock;

use regex::Regex;

/// A run of amount-like tokens on one line: "89190.00 89190.00", "8,50,000".
static AMOUNT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,.]*(?:[ \t]+\d[\d,.]*)*").unwrap());

/// Parse an amount written with Indian grouping.
///
/// - `8,50,000` and `1,50,00,000` drop their separators.
/// - `8.50.000` (several dots, digits only) treats the dots as separators.
/// - `89190.00 89190.00` (repeated columns) keeps the first figure.
///
/// Anything unparsable is 0.
pub fn parse_indian_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let mut candidate = trimmed;
    let is_numeric_run = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || c == ',' || c == '.' || c.is_whitespace());
    if is_numeric_run {
        if let Some(first) = trimmed.split_whitespace().next() {
            candidate = first;
        }
    }

    let mut cleaned: String = candidate
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let dot_count = cleaned.matches('.').count();
    if dot_count >= 2 && cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        cleaned.retain(|c| c != '.');
    }

    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// An amount found in text, with the token it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountToken<'a> {
    pub value: f64,
    pub token: &'a str,
}

impl AmountToken<'_> {
    pub fn has_fraction(&self) -> bool {
        self.token.contains('.')
    }
}

/// Every amount run in `text`, in order, each reduced to its first token.
pub fn amount_runs(text: &str) -> Vec<AmountToken<'_>> {
    AMOUNT_RUN
        .find_iter(text)
        .filter_map(|m| {
            let token = m.as_str().split_whitespace().next()?;
            Some(AmountToken {
                value: parse_indian_number(token),
                token,
            })
        })
        .collect()
}

/// First capture of the first pattern that yields a value inside `range`.
pub fn first_pattern_amount(
    text: &str,
    patterns: &[Regex],
    range: std::ops::RangeInclusive<f64>,
) -> Option<f64> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| parse_indian_number(m.as_str()))
            .find(|v| range.contains(v))
    })
}

/// Byte window of `radius` around `[start, end)`, snapped to char boundaries.
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let mut lo = start.saturating_sub(radius);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + radius).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    &text[lo..hi]
}

/// Six-digit integers look like Indian PIN codes, not amounts.
pub fn looks_like_pin_code(token: &AmountToken<'_>) -> bool {
    (100_000.0..=999_999.0).contains(&token.value) && !token.has_fraction()
}
