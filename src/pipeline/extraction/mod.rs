//! Field extraction: classified documents in, merged raw income and
//! deduction fields out.

pub mod bank;
pub mod classify;
pub mod confidence;
pub mod form16;
pub mod numbers;

pub use bank::extract_bank;
pub use classify::*;
pub use confidence::*;
pub use form16::extract_form16;
pub use numbers::parse_indian_number;

use crate::models::{
    DocumentRecord, DocumentType, ExtractionMethod, RawDeductionFields, RawIncomeFields,
};
use crate::pipeline::oracle::{infer_record, FieldExtractionRecord, InferenceOracle, OracleError};
use crate::pipeline::prompt::build_extraction_prompt;

/// Bank TDS above this share of interest is a misread balance.
pub const MAX_BANK_TDS_RATIO: f64 = 0.25;
/// Salary TDS above this share of salary is a misread figure.
pub const MAX_SALARY_TDS_RATIO: f64 = 0.40;

/// Merged fields across all documents, plus what the sanity clamp did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionOutcome {
    pub income: RawIncomeFields,
    pub deductions: RawDeductionFields,
    pub clamp_notes: Vec<String>,
}

/// Deterministic extractor for a document type, if there is one.
pub fn heuristic_fields(
    doc_type: DocumentType,
    text: &str,
) -> Option<(RawIncomeFields, RawDeductionFields)> {
    match doc_type {
        DocumentType::Form16 => Some(extract_form16(text)),
        DocumentType::BankInterest => Some(extract_bank(text)),
        DocumentType::Form26As | DocumentType::Other => None,
    }
}

fn oracle_fields(
    oracle: &dyn InferenceOracle,
    doc: &DocumentRecord,
) -> Result<(RawIncomeFields, RawDeductionFields), OracleError> {
    let prompt = build_extraction_prompt(doc.doc_type, &doc.raw_text);
    let record: FieldExtractionRecord = infer_record(oracle, &prompt)?;
    if !record.has_signal() {
        return Err(OracleError::NoSignal);
    }

    let income = RawIncomeFields {
        gross_salary: record.gross_salary,
        tds_salary: record.tds_salary,
        interest_income: record.interest_income,
        tds_bank: record.tds_bank,
        other_income: 0.0,
        employer_name: record
            .employer_name
            .map(|n| n.trim().chars().take(100).collect())
            .unwrap_or_default(),
    };
    let deductions = RawDeductionFields {
        section_80c: record.section_80c,
        section_80d: record.section_80d,
        hra_exemption: record.hra_exemption,
        other: record.home_loan_interest,
    };
    Ok((income, deductions))
}

/// Extract one document and record on it which method produced the figures.
pub fn extract_document(
    oracle: &dyn InferenceOracle,
    doc: &mut DocumentRecord,
) -> (RawIncomeFields, RawDeductionFields) {
    if doc.source_error.is_some() || doc.raw_text.trim().is_empty() {
        doc.extraction = Some(ExtractionMethod::Skipped {
            reason: "no readable text".into(),
        });
        return Default::default();
    }

    let Some(heuristic) = heuristic_fields(doc.doc_type, &doc.raw_text) else {
        doc.extraction = Some(ExtractionMethod::Skipped {
            reason: format!("no extractor for {}", doc.doc_type),
        });
        return Default::default();
    };

    if !oracle.is_live() {
        doc.extraction = Some(ExtractionMethod::Heuristic);
        return heuristic;
    }

    match oracle_fields(oracle, doc) {
        Ok(fields) => {
            doc.extraction = Some(ExtractionMethod::Oracle);
            fields
        }
        Err(e) => {
            tracing::warn!(
                stage = "FIELD_EXTRACTION",
                file = %doc.filename,
                error = %e,
                "Oracle extraction failed, using heuristics"
            );
            doc.extraction = Some(ExtractionMethod::OracleFallback {
                reason: e.to_string(),
            });
            heuristic
        }
    }
}

/// Extract every document, merge by componentwise maximum, then clamp
/// implausible TDS figures.
pub fn extract_documents(
    oracle: &dyn InferenceOracle,
    docs: &mut [DocumentRecord],
) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();
    for doc in docs.iter_mut() {
        let (income, deductions) = extract_document(oracle, doc);
        outcome.income.merge_max(&income);
        outcome.deductions.merge_max(&deductions);
    }
    outcome.clamp_notes = apply_sanity_clamp(&mut outcome.income);
    outcome
}

/// Zero a TDS figure that is too large a share of its source income.
pub fn apply_sanity_clamp(income: &mut RawIncomeFields) -> Vec<String> {
    let mut notes = Vec::new();

    if income.interest_income > 0.0 && income.tds_bank > income.interest_income * MAX_BANK_TDS_RATIO
    {
        notes.push(format!(
            "bank TDS {:.2} exceeds {:.0}% of interest {:.2}; reset to 0",
            income.tds_bank,
            MAX_BANK_TDS_RATIO * 100.0,
            income.interest_income
        ));
        income.tds_bank = 0.0;
    }

    if income.gross_salary > 0.0 && income.tds_salary > income.gross_salary * MAX_SALARY_TDS_RATIO {
        notes.push(format!(
            "salary TDS {:.2} exceeds {:.0}% of salary {:.2}; reset to 0",
            income.tds_salary,
            MAX_SALARY_TDS_RATIO * 100.0,
            income.gross_salary
        ));
        income.tds_salary = 0.0;
    }

    for note in &notes {
        tracing::info!(stage = "FIELD_EXTRACTION", "Sanity clamp: {note}");
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawDocument;
    use crate::pipeline::oracle::{HeuristicOracle, MockOracle, MockReply};

    fn classified(filename: &str, doc_type: DocumentType, text: &str) -> DocumentRecord {
        let (mut record, _) = classify_document(&HeuristicOracle, &RawDocument::from_text(filename, text));
        record.doc_type = doc_type;
        record
    }

    #[test]
    fn bank_tds_clamped_against_interest() {
        let mut income = RawIncomeFields {
            interest_income: 2_000.0,
            tds_bank: 94_000.0,
            ..Default::default()
        };
        let notes = apply_sanity_clamp(&mut income);
        assert_eq!(income.tds_bank, 0.0);
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn plausible_tds_kept() {
        let mut income = RawIncomeFields {
            gross_salary: 1_000_000.0,
            tds_salary: 120_000.0,
            interest_income: 50_000.0,
            tds_bank: 5_000.0,
            ..Default::default()
        };
        assert!(apply_sanity_clamp(&mut income).is_empty());
        assert_eq!(income.tds_salary, 120_000.0);
        assert_eq!(income.tds_bank, 5_000.0);
    }

    #[test]
    fn salary_tds_over_forty_percent_clamped() {
        let mut income = RawIncomeFields {
            gross_salary: 100_000.0,
            tds_salary: 40_001.0,
            ..Default::default()
        };
        apply_sanity_clamp(&mut income);
        assert_eq!(income.tds_salary, 0.0);
    }

    #[test]
    fn heuristic_extraction_merges_documents() {
        let mut docs = vec![
            classified("form16.txt", DocumentType::Form16, "Gross Salary: 8,50,000\nTotal TDS: 45,000"),
            classified("form16_b.txt", DocumentType::Form16, "Gross Salary: 9,00,000"),
            classified("bank.txt", DocumentType::BankInterest, "Interest earned: 12,000\nTDS: 1,200"),
        ];
        let outcome = extract_documents(&HeuristicOracle, &mut docs);
        assert_eq!(outcome.income.gross_salary, 900_000.0);
        assert_eq!(outcome.income.tds_salary, 45_000.0);
        assert_eq!(outcome.income.interest_income, 12_000.0);
        assert_eq!(outcome.income.tds_bank, 1_200.0);
        assert!(docs
            .iter()
            .all(|d| d.extraction == Some(ExtractionMethod::Heuristic)));
    }

    #[test]
    fn oracle_extraction_used_when_it_has_signal() {
        let oracle = MockOracle::new().with_value(
            "field_extraction",
            serde_json::json!({"gross_salary": "8,50,000", "tds_salary": 60000, "home_loan_interest": 150000}),
        );
        let mut doc = classified("form16.txt", DocumentType::Form16, "Gross Salary: 1,00,000");
        let (income, deductions) = extract_document(&oracle, &mut doc);
        assert_eq!(doc.extraction, Some(ExtractionMethod::Oracle));
        assert_eq!(income.gross_salary, 850_000.0);
        assert_eq!(deductions.other, 150_000.0);
    }

    #[test]
    fn empty_oracle_answer_falls_back() {
        let oracle = MockOracle::new().with_value("field_extraction", serde_json::json!({}));
        let mut doc = classified("form16.txt", DocumentType::Form16, "Gross Salary: 8,50,000");
        let (income, _) = extract_document(&oracle, &mut doc);
        assert_eq!(income.gross_salary, 850_000.0);
        assert!(matches!(
            doc.extraction,
            Some(ExtractionMethod::OracleFallback { .. })
        ));
    }

    #[test]
    fn oracle_timeout_falls_back() {
        let oracle = MockOracle::new().with_reply("field_extraction", MockReply::Timeout);
        let mut doc = classified("bank.txt", DocumentType::BankInterest, "Interest credited: 9,000");
        let (income, _) = extract_document(&oracle, &mut doc);
        assert_eq!(income.interest_income, 9_000.0);
        match &doc.extraction {
            Some(ExtractionMethod::OracleFallback { reason }) => assert!(reason.contains("timed out")),
            other => panic!("unexpected method {other:?}"),
        }
    }

    #[test]
    fn form26as_and_unreadable_skipped() {
        let oracle = MockOracle::new();
        let mut statement = classified("26as.txt", DocumentType::Form26As, "Form 26AS TDS 5,000");
        let mut scan = classified("scan.png", DocumentType::Form16, "");
        extract_document(&oracle, &mut statement);
        extract_document(&oracle, &mut scan);
        assert!(matches!(statement.extraction, Some(ExtractionMethod::Skipped { .. })));
        assert!(matches!(scan.extraction, Some(ExtractionMethod::Skipped { .. })));
        assert_eq!(oracle.total_calls(), 0);
    }
}
