//! Heuristics for bank interest certificates and account statements.

use std::sync::LazyLock;

use regex::Regex;

use super::numbers::{context_window, first_pattern_amount, parse_indian_number};
use crate::models::{RawDeductionFields, RawIncomeFields};

/// Interest figures outside this band are treated as totals or balances.
const PLAUSIBLE_INTEREST: std::ops::RangeInclusive<f64> = 1_000.0..=200_000.0;
/// Final acceptance band for an interest figure.
const ACCEPTED_INTEREST: std::ops::RangeInclusive<f64> = 100.0..=10_000_000.0;
const ANY_AMOUNT: std::ops::RangeInclusive<f64> = 0.0..=f64::MAX;
const KEYWORD_RADIUS: usize = 80;
const INTEREST_KEYWORDS: &[&str] = &["interest", "deposit", "fd", "earned", "credited"];

static INTEREST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r"(?i)interest\s+(?:amount|income|earned|credited)\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
        Regex::new(
            r"(?i)(?:fd|fixed\s+deposit|savings?)\s+interest\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
        Regex::new(
            r"(?i)total\s+interest\s+(?:earned|credited)\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
    ]
});

static DECIMAL_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{1,7}\.[0-9]{2,}").unwrap());

static DECIMAL_ONLY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,7}\.[0-9]{2,}$").unwrap());

static TDS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r"(?i)tds\s+(?:deducted|on\s+interest|amount)[^\n]*?[:\-]\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
        Regex::new(
            r"(?i)tax\s+deducted\s+at\s+source[^\n]*?[:\-]\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
        Regex::new(r"(?i)tds\s*@\s*\d+(?:\.\d+)?\s*%[^\n]*?[:\-]\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)")
            .unwrap(),
        Regex::new(r"(?i)tds\s*[:\-]\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
    ]
});

static PRINCIPAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r"(?i)principal\s+(?:paid|amount|repayment)\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
        Regex::new(r"(?i)repayment\s+of\s+principal\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)")
            .unwrap(),
    ]
});

static LOAN_INTEREST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r"(?i)interest\s+(?:paid|payable|on\s+loan)\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
        Regex::new(
            r"(?i)(?:home|housing)\s+loan\s+interest\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
        Regex::new(r"(?i)loan\s+interest\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
    ]
});

/// Everything the heuristics can read from one bank document.
/// Loan principal lands in 80C, loan interest in `other`.
pub fn extract_bank(text: &str) -> (RawIncomeFields, RawDeductionFields) {
    let interest_income = extract_interest(text);
    let mut tds_bank = extract_tds(text);
    // The interest figure matched again under a TDS label.
    if interest_income > 0.0 && tds_bank == interest_income {
        tds_bank = 0.0;
    }
    let income = RawIncomeFields {
        interest_income,
        tds_bank,
        ..Default::default()
    };
    let deductions = RawDeductionFields {
        section_80c: first_pattern_amount(text, &PRINCIPAL_PATTERNS, ANY_AMOUNT).unwrap_or(0.0),
        other: first_pattern_amount(text, &LOAN_INTEREST_PATTERNS, ANY_AMOUNT).unwrap_or(0.0),
        ..Default::default()
    };
    (income, deductions)
}

/// Interest earned or credited. Labelled figures first; when those are
/// missing or look like a total, fall back to unlabelled decimal figures
/// that are not marked as totals.
pub fn extract_interest(text: &str) -> f64 {
    let mut value = first_pattern_amount(text, &INTEREST_PATTERNS, ANY_AMOUNT).unwrap_or(0.0);

    if needs_fallback(value) {
        if let Some(best) = keyword_candidates(text).into_iter().reduce(f64::max) {
            value = best;
        }
    }

    if needs_fallback(value) {
        if let Some(best) = standalone_line_candidates(text).into_iter().reduce(f64::max) {
            value = best;
        }
    }

    if ACCEPTED_INTEREST.contains(&value) {
        value
    } else {
        0.0
    }
}

pub fn extract_tds(text: &str) -> f64 {
    first_pattern_amount(text, &TDS_PATTERNS, ANY_AMOUNT).unwrap_or(0.0)
}

fn needs_fallback(value: f64) -> bool {
    value == 0.0 || value > *PLAUSIBLE_INTEREST.end()
}

fn keyword_candidates(text: &str) -> Vec<f64> {
    DECIMAL_AMOUNT
        .find_iter(text)
        .filter_map(|m| {
            let context = context_window(text, m.start(), m.start(), KEYWORD_RADIUS).to_lowercase();
            let near_keyword = INTEREST_KEYWORDS.iter().any(|k| context.contains(k));
            if !near_keyword || context.contains("total") {
                return None;
            }
            let value = parse_indian_number(m.as_str());
            PLAUSIBLE_INTEREST.contains(&value).then_some(value)
        })
        .collect()
}

fn standalone_line_candidates(text: &str) -> Vec<f64> {
    let lines: Vec<&str> = text.lines().collect();
    lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let trimmed = line.trim();
            if !DECIMAL_ONLY_LINE.is_match(trimmed) {
                return None;
            }
            let previous = if i > 0 { lines[i - 1] } else { "" };
            if previous.to_lowercase().contains("total") {
                return None;
            }
            let value = parse_indian_number(trimmed);
            PLAUSIBLE_INTEREST.contains(&value).then_some(value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CITI_STATEMENT: &str = "DILLI KUMAR C Citibank Account Statement as on May 1, 2016\nBENGALURU - 560001\nNet Relationship Value for APR-16 (INR) = 161535.96\nAssets 94185.86 49669.89\n143855.75\nTOTAL (INR) 209183.00";

    #[test]
    fn standalone_figure_beats_labelled_total() {
        assert_eq!(extract_interest(CITI_STATEMENT), 143_855.75);
    }

    #[test]
    fn labelled_interest_used_directly() {
        let text = "Interest Credited: Rs. 12,450.00\nTDS deducted: 1,245";
        let (income, _) = extract_bank(text);
        assert_eq!(income.interest_income, 12_450.0);
        assert_eq!(income.tds_bank, 1_245.0);
    }

    #[test]
    fn keyword_context_fallback() {
        let text = "Fixed deposit no 1234 matured\nproceeds 45210.50 transferred";
        assert_eq!(extract_interest(text), 45_210.5);
    }

    #[test]
    fn keyword_context_with_total_rejected() {
        let text = "Total interest for the year\n45210.50";
        // The decimal sits next to "total" on the previous line as well.
        assert_eq!(extract_interest(text), 0.0);
    }

    #[test]
    fn tiny_interest_rejected() {
        assert_eq!(extract_interest("Interest earned: 45"), 0.0);
    }

    #[test]
    fn tds_at_rate_pattern() {
        assert_eq!(extract_tds("TDS @ 10% on interest: 4,500"), 4_500.0);
        assert_eq!(extract_tds("nothing here"), 0.0);
    }

    #[test]
    fn tds_equal_to_interest_discarded() {
        let (income, _) = extract_bank("Interest earned: 12,450.00\nTDS on interest: 12,450.00");
        assert_eq!(income.interest_income, 12_450.0);
        assert_eq!(income.tds_bank, 0.0);
    }

    #[test]
    fn bare_loan_interest_label() {
        let (income, deductions) = extract_bank("Loan interest: 1,80,000");
        assert_eq!(deductions.other, 180_000.0);
        assert_eq!(income.interest_income, 0.0);
    }

    #[test]
    fn loan_principal_and_interest() {
        let text = "Principal repayment: 1,20,000\nInterest paid: 1,80,000";
        let (income, deductions) = extract_bank(text);
        assert_eq!(deductions.section_80c, 120_000.0);
        assert_eq!(deductions.other, 180_000.0);
        assert_eq!(income.interest_income, 0.0);
    }
}
