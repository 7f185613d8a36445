use serde::{Deserialize, Serialize};

use super::enums::TaxRegime;
use super::income::{RawDeductionFields, RawIncomeFields};

/// Identity and filing preferences of the person the return is for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxpayerProfile {
    pub name: String,
    pub pan: String,
    pub age: u32,
    pub regime: TaxRegime,
    /// Financial year in "YYYY-YY" form, e.g. "2024-25".
    pub financial_year: String,
    pub residential_status: String,
}

impl Default for TaxpayerProfile {
    fn default() -> Self {
        Self {
            name: "Taxpayer".into(),
            pan: "ABCDE1234F".into(),
            age: 30,
            regime: TaxRegime::Old,
            financial_year: "2024-25".into(),
            residential_status: "resident".into(),
        }
    }
}

impl TaxpayerProfile {
    pub fn is_senior(&self, senior_age: u32) -> bool {
        self.age >= senior_age
    }

    /// Assessment year follows the financial year: "2024-25" -> "2025-26".
    /// Returns None when the financial year does not start with a 4-digit year.
    pub fn assessment_year(&self) -> Option<String> {
        let start: i32 = self.financial_year.trim().get(..4)?.parse().ok()?;
        let next = start + 1;
        Some(format!("{next}-{:02}", (next + 1) % 100))
    }
}

/// Pre-populated figures entered by hand; skips classification and extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualInput {
    pub taxpayer: TaxpayerProfile,
    pub salary: f64,
    pub interest_income: f64,
    pub other_income: f64,
    pub tds_salary: f64,
    pub tds_bank: f64,
    pub section_80c: f64,
    pub section_80d: f64,
    pub hra_exemption: f64,
    pub other_deductions: f64,
}

impl ManualInput {
    pub fn income_fields(&self) -> RawIncomeFields {
        RawIncomeFields {
            gross_salary: self.salary,
            tds_salary: self.tds_salary,
            interest_income: self.interest_income,
            tds_bank: self.tds_bank,
            other_income: self.other_income,
            employer_name: String::new(),
        }
    }

    pub fn deduction_fields(&self) -> RawDeductionFields {
        RawDeductionFields {
            section_80c: self.section_80c,
            section_80d: self.section_80d,
            hra_exemption: self.hra_exemption,
            other: self.other_deductions,
        }
    }
}

/// A document as handed to the pipeline: its text, or the reason no text could be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub filename: String,
    pub text: String,
    pub source_error: Option<String>,
}

impl RawDocument {
    pub fn from_text(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
            source_error: None,
        }
    }

    pub fn unreadable(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: String::new(),
            source_error: Some(reason.into()),
        }
    }

    pub fn is_readable(&self) -> bool {
        self.source_error.is_none()
    }
}

/// Entry shape for a new filing run.
#[derive(Debug, Clone)]
pub enum FilingInput {
    Documents {
        taxpayer: TaxpayerProfile,
        documents: Vec<RawDocument>,
    },
    Manual(ManualInput),
}

impl FilingInput {
    pub fn taxpayer(&self) -> &TaxpayerProfile {
        match self {
            Self::Documents { taxpayer, .. } => taxpayer,
            Self::Manual(manual) => &manual.taxpayer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assessment_year_follows_financial_year() {
        let profile = TaxpayerProfile::default();
        assert_eq!(profile.assessment_year().as_deref(), Some("2025-26"));

        let profile = TaxpayerProfile {
            financial_year: "2099-00".into(),
            ..Default::default()
        };
        assert_eq!(profile.assessment_year().as_deref(), Some("2100-01"));
    }

    #[test]
    fn assessment_year_none_for_garbage() {
        let profile = TaxpayerProfile {
            financial_year: "FY".into(),
            ..Default::default()
        };
        assert!(profile.assessment_year().is_none());
    }

    #[test]
    fn manual_input_splits_into_fields() {
        let manual = ManualInput {
            salary: 1_500_000.0,
            tds_salary: 150_000.0,
            section_80c: 150_000.0,
            other_deductions: 10_000.0,
            ..Default::default()
        };
        let income = manual.income_fields();
        let deductions = manual.deduction_fields();
        assert_eq!(income.gross_salary, 1_500_000.0);
        assert_eq!(income.tds_salary, 150_000.0);
        assert_eq!(deductions.section_80c, 150_000.0);
        assert_eq!(deductions.other, 10_000.0);
    }

    #[test]
    fn manual_input_deserializes_with_defaults() {
        let manual: ManualInput =
            serde_json::from_str(r#"{"salary": 900000, "taxpayer": {"regime": "NEW"}}"#).unwrap();
        assert_eq!(manual.salary, 900_000.0);
        assert_eq!(manual.taxpayer.regime, TaxRegime::New);
        assert_eq!(manual.taxpayer.pan, "ABCDE1234F");
    }

    #[test]
    fn unreadable_document_has_no_text() {
        let doc = RawDocument::unreadable("scan.pdf", "no extraction capability");
        assert!(!doc.is_readable());
        assert!(doc.text.is_empty());
    }
}
