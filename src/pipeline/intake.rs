//! Free-form intake: a sentence describing someone's finances turned into
//! manual input.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ManualInput, TaxRegime};
use crate::pipeline::extraction::parse_indian_number;
use crate::pipeline::oracle::{infer_record, DescriptionRecord, InferenceOracle};
use crate::pipeline::prompt::build_description_prompt;

static CLAUSE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;\n]|,\s+|\s+and\s+|\s+plus\s+").unwrap());

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*(crores?|cr|lakhs?|lacs?|lac|lpa|l|k|thousand)?\b").unwrap()
});

/// Field keywords. Alternation order matters: bank TDS phrases before plain "tds".
static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<tds_bank>\bbank\s+tds\b|\btds\s+(?:by|from|on)\s+(?:the\s+)?(?:bank|interest|fds?)\b|\binterest\s+tds\b)",
        r"|(?P<tds_salary>\btds\b|\btax\s+deducted\b)",
        r"|(?P<sec_80d>\b80\s?d\b|\bhealth\b|\bmedical\b|\bmediclaim\b)",
        r"|(?P<sec_80c>\b80\s?c\b|\bppf\b|\belss\b|\blic\b|\bepf\b)",
        r"|(?P<hra>\bhra\b|\brent\b)",
        r"|(?P<interest>\binterest\b|\bfds?\b|\bfixed\s+deposits?\b|\bsavings\b)",
        r"|(?P<salary>\bsalary\b|\bctc\b|\bpackage\b|\bearn\w*|\bincome\b)",
    ))
    .unwrap()
});

static REGIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(new|old)\s+(?:tax\s+)?regime\b").unwrap());

static AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\baged?\s*(?:is\s*)?(\d{2,3})\b|\b(\d{2,3})\s*(?:years?|yrs?)\s*old\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Salary,
    Interest,
    TdsSalary,
    TdsBank,
    Section80C,
    Section80D,
    Hra,
}

const FIELD_GROUPS: [(&str, Field); 7] = [
    ("tds_bank", Field::TdsBank),
    ("tds_salary", Field::TdsSalary),
    ("sec_80d", Field::Section80D),
    ("sec_80c", Field::Section80C),
    ("hra", Field::Hra),
    ("interest", Field::Interest),
    ("salary", Field::Salary),
];

fn multiplier(suffix: &str) -> f64 {
    match suffix {
        "crore" | "crores" | "cr" => 10_000_000.0,
        "lakh" | "lakhs" | "lac" | "lacs" | "lpa" | "l" => 100_000.0,
        "k" | "thousand" => 1_000.0,
        _ => 1.0,
    }
}

/// First amount in `text`, with lakh/crore/k suffixes applied, to the paisa.
pub fn parse_amount(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase();
    let caps = AMOUNT.captures(&lowered)?;
    let base = parse_indian_number(caps.get(1)?.as_str());
    let suffix = caps.get(2).map_or("", |m| m.as_str());
    Some((base * multiplier(suffix) * 100.0).round() / 100.0)
}

fn assign(input: &mut ManualInput, field: Field, amount: f64) {
    let slot = match field {
        Field::Salary => &mut input.salary,
        Field::Interest => &mut input.interest_income,
        Field::TdsSalary => &mut input.tds_salary,
        Field::TdsBank => &mut input.tds_bank,
        Field::Section80C => &mut input.section_80c,
        Field::Section80D => &mut input.section_80d,
        Field::Hra => &mut input.hra_exemption,
    };
    *slot += amount;
}

/// Keywords in a clause claim the amount that follows them. A run of keywords
/// with no amount in between is one phrase, named by its first keyword
/// ("FD interest income 40k" is interest).
fn parse_clause(clause: &str, input: &mut ManualInput) {
    let keywords: Vec<(usize, usize, Field)> = KEYWORD
        .captures_iter(clause)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let field = FIELD_GROUPS
                .iter()
                .find(|(group, _)| caps.name(group).is_some())
                .map(|(_, field)| *field)?;
            Some((whole.start(), whole.end(), field))
        })
        .collect();
    let Some(&(first_start, _, _)) = keywords.first() else {
        return;
    };

    let mut pending: Option<Field> = None;
    for (i, &(_, end, field)) in keywords.iter().enumerate() {
        let pending_field = *pending.get_or_insert(field);
        let next_start = keywords.get(i + 1).map_or(clause.len(), |k| k.0);
        if let Some(amount) = parse_amount(&clause[end..next_start]) {
            assign(input, pending_field, amount);
            pending = None;
        }
    }

    // "12 lakh salary": the amount came first.
    if let Some(field) = pending {
        if let Some(amount) = parse_amount(&clause[..first_start]) {
            assign(input, field, amount);
        }
    }
}

/// Keyword heuristics over the description.
pub fn parse_description_heuristic(text: &str) -> ManualInput {
    let lowered = text.to_lowercase();
    let mut input = ManualInput::default();

    for clause in CLAUSE_BREAK.split(&lowered) {
        parse_clause(clause, &mut input);
    }

    if let Some(caps) = REGIME.captures(&lowered) {
        input.taxpayer.regime = if &caps[1] == "new" {
            TaxRegime::New
        } else {
            TaxRegime::Old
        };
    }
    if let Some(age) = AGE
        .captures(&lowered)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|age| (18..=120).contains(age))
    {
        input.taxpayer.age = age;
    }
    input
}

/// Oracle first, accepted only when it found at least one amount; keyword
/// heuristics otherwise.
pub fn parse_description(oracle: &dyn InferenceOracle, text: &str) -> ManualInput {
    let heuristic = parse_description_heuristic(text);
    if !oracle.is_live() {
        return heuristic;
    }

    match infer_record::<DescriptionRecord>(oracle, &build_description_prompt(text)) {
        Ok(record) if record.has_signal() => {
            let mut taxpayer = heuristic.taxpayer.clone();
            if let Some(regime) = record
                .regime
                .as_deref()
                .and_then(|r| r.trim().to_uppercase().parse::<TaxRegime>().ok())
            {
                taxpayer.regime = regime;
            }
            ManualInput {
                taxpayer,
                salary: record.salary,
                interest_income: record.interest_income,
                tds_salary: record.tds_salary,
                tds_bank: record.tds_bank,
                section_80c: record.section_80c,
                section_80d: record.section_80d,
                hra_exemption: record.hra_exemption,
                ..Default::default()
            }
        }
        Ok(_) => {
            tracing::warn!("Description parse returned no amounts, using keyword heuristics");
            heuristic
        }
        Err(e) => {
            tracing::warn!(error = %e, "Description parse fell back to keyword heuristics");
            heuristic
        }
    }
}
