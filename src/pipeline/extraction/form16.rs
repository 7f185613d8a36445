//! Heuristics for Form 16 (employer TDS certificate) text.

use std::sync::LazyLock;

use regex::Regex;

use super::numbers::{amount_runs, first_pattern_amount, looks_like_pin_code, parse_indian_number};
use crate::models::{RawDeductionFields, RawIncomeFields};

/// Plausible salary range when scanning a section without labels.
const SECTION_SALARY_RANGE: std::ops::RangeInclusive<f64> = 50_000.0..=100_000_000.0;
/// Labelled salary figures may be smaller (part-year employment).
const LABELLED_SALARY_RANGE: std::ops::RangeInclusive<f64> = 10_000.0..=100_000_000.0;
const TDS_RANGE: std::ops::RangeInclusive<f64> = 1_000.0..=5_000_000.0;
const ANY_AMOUNT: std::ops::RangeInclusive<f64> = 0.0..=f64::MAX;

static SALARY_SUMMARY_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)summary\s+of\s+amount.*?details").unwrap());

static TDS_DETAILS_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)details\s+of\s+tax\s+deducted.*").unwrap());

static SALARY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)gross\s+salary\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
        Regex::new(r"(?i)annual\s+salary\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
        Regex::new(r"(?i)total\s+amount\s+of\s+salary[^\d\n]*(\d[\d,.]*)").unwrap(),
        Regex::new(r"(?i)salary\s+income\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
        Regex::new(r"(?i)salary\s*[:\-]\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
    ]
});

static TDS_PRIMARY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)tds\s+deducted\s*[:\-]\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
        Regex::new(
            r"(?i)amount\s+of\s+tax\s+deducted\s*(?:\(rs\.?\))?\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
        Regex::new(r"(?i)tax\s+deducted\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
    ]
});

static TDS_FALLBACK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)total\s+tds\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
        Regex::new(r"(?i)tds\s+(?:at\s+)?(?:deducted|source)\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)")
            .unwrap(),
        Regex::new(r"(?i)income\s+tax\s+deducted\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)").unwrap(),
    ]
});

static SECTION_80C_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"(?i)(?:section\s+)?80\s*-?\s*c\b[^\d\n]{0,40}(\d[\d,.]*)").unwrap()]
});

static SECTION_80D_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(?:section\s+)?80\s*-?\s*d\b[^\d\n]{0,40}(\d[\d,.]*)").unwrap(),
        Regex::new(
            r"(?i)(?:health|medical|mediclaim)\s+insurance(?:\s+premium)?\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)",
        )
        .unwrap(),
    ]
});

static HRA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)hra\s+(?:exemption|exempted|exempt)\s*[:\-]?\s*(?:rs\.?|₹|inr)?\s*(\d[\d,.]*)")
            .unwrap(),
        Regex::new(r"(?i)house\s+rent\s+allowance[^\d\n]{0,40}(\d[\d,.]*)").unwrap(),
    ]
});

static EMPLOYER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?im)name\s+(?:and\s+address\s+)?of\s+(?:the\s+)?employer\s*[:\-]\s*([A-Za-z0-9&.,\- ]+?)\s*$")
            .unwrap(),
        Regex::new(r"(?im)employer\s*[:\-]\s*([A-Za-z0-9&.,\- ]+?)\s*$").unwrap(),
    ]
});

/// Everything the heuristics can read from one Form 16.
pub fn extract_form16(text: &str) -> (RawIncomeFields, RawDeductionFields) {
    let gross_salary = extract_salary(text);
    let income = RawIncomeFields {
        gross_salary,
        tds_salary: extract_tds(text, gross_salary),
        employer_name: extract_employer(text).unwrap_or_default(),
        ..Default::default()
    };
    let deductions = RawDeductionFields {
        section_80c: first_pattern_amount(text, &SECTION_80C_PATTERNS, ANY_AMOUNT).unwrap_or(0.0),
        section_80d: first_pattern_amount(text, &SECTION_80D_PATTERNS, ANY_AMOUNT).unwrap_or(0.0),
        hra_exemption: first_pattern_amount(text, &HRA_PATTERNS, ANY_AMOUNT).unwrap_or(0.0),
        other: 0.0,
    };
    (income, deductions)
}

/// Gross salary: the employee summary block first, labelled figures second.
pub fn extract_salary(text: &str) -> f64 {
    if let Some(section) = SALARY_SUMMARY_SECTION.find(text) {
        if let Some(run) = amount_runs(section.as_str())
            .into_iter()
            .find(|r| SECTION_SALARY_RANGE.contains(&r.value))
        {
            return run.value;
        }
    }

    first_pattern_amount(text, &SALARY_PATTERNS, LABELLED_SALARY_RANGE).unwrap_or(0.0)
}

/// Salary TDS. A candidate exactly equal to `salary` is the salary re-matched
/// and is skipped; near misses are not.
pub fn extract_tds(text: &str, salary: f64) -> f64 {
    let is_salary = |v: f64| salary > 0.0 && v == salary;

    if let Some(section) = TDS_DETAILS_SECTION.find(text) {
        if let Some(run) = amount_runs(section.as_str()).into_iter().find(|r| {
            TDS_RANGE.contains(&r.value) && !is_salary(r.value) && !looks_like_pin_code(r)
        }) {
            return run.value;
        }
    }

    for patterns in [&*TDS_PRIMARY_PATTERNS, &*TDS_FALLBACK_PATTERNS] {
        let found = patterns.iter().find_map(|re| {
            re.captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| parse_indian_number(m.as_str()))
                .find(|v| TDS_RANGE.contains(v) && !is_salary(*v))
        });
        if let Some(value) = found {
            return value;
        }
    }

    0.0
}

pub fn extract_employer(text: &str) -> Option<String> {
    EMPLOYER_PATTERNS.iter().find_map(|re| {
        let name = re.captures(text)?.get(1)?.as_str().trim();
        if name.is_empty() {
            None
        } else {
            Some(name.chars().take(100).collect())
        }
    })
}
