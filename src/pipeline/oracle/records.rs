//! Records the oracle is asked to produce, one per call site.
//!
//! Verdict flags are required fields: a response missing them is malformed and
//! the caller falls back, rather than silently reading `false` or `true`.

use serde::Deserialize;

use super::parser::de_amount;
use super::{OracleRecord, TargetShape};

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationRecord {
    pub doc_type: String,
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

impl OracleRecord for ClassificationRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "document_classification",
        skeleton: r#"{"doc_type": "FORM_16 | BANK_INT | FORM_26AS | OTHER", "confidence": 0.0, "reasoning": ""}"#,
    };
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldExtractionRecord {
    #[serde(default, deserialize_with = "de_amount")]
    pub gross_salary: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub tds_salary: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub interest_income: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub tds_bank: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub section_80c: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub section_80d: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub hra_exemption: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub home_loan_interest: f64,
    #[serde(default)]
    pub employer_name: Option<String>,
}

impl FieldExtractionRecord {
    pub fn has_signal(&self) -> bool {
        [
            self.gross_salary,
            self.tds_salary,
            self.interest_income,
            self.tds_bank,
            self.section_80c,
            self.section_80d,
            self.hra_exemption,
            self.home_loan_interest,
        ]
        .iter()
        .any(|v| *v != 0.0)
    }
}

impl OracleRecord for FieldExtractionRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "field_extraction",
        skeleton: r#"{"gross_salary": 0, "tds_salary": 0, "interest_income": 0, "tds_bank": 0, "section_80c": 0, "section_80d": 0, "hra_exemption": 0, "home_loan_interest": 0, "employer_name": ""}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomePlausibilityRecord {
    pub is_reasonable: bool,
    #[serde(default)]
    pub anomaly_score: f32,
    #[serde(default)]
    pub reasoning: String,
}

impl OracleRecord for IncomePlausibilityRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "income_plausibility",
        skeleton: r#"{"is_reasonable": true, "anomaly_score": 0.0, "reasoning": ""}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationReviewRecord {
    pub is_aggregated_correctly: bool,
    #[serde(default)]
    pub anomalies: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl OracleRecord for AggregationReviewRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "aggregation_review",
        skeleton: r#"{"is_aggregated_correctly": true, "anomalies": [], "reasoning": ""}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRecord {
    pub scenario_type: String,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub reasoning: String,
}

impl OracleRecord for ScenarioRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "tax_scenario",
        skeleton: r#"{"scenario_type": "SALARIED_BASIC | HIGH_EARNER | COMPLEX_CAPITAL_GAINS | SENIOR_CITIZEN", "risk_level": "LOW | MEDIUM | HIGH", "reasoning": ""}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeductionNarrativeRecord {
    pub bullets: Vec<String>,
}

impl OracleRecord for DeductionNarrativeRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "deduction_explanation",
        skeleton: r#"{"bullets": ["- one short sentence per point"]}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizationRecord {
    pub optimization_strategies: Vec<String>,
    #[serde(default, deserialize_with = "de_amount")]
    pub potential_annual_saving: f64,
}

impl OracleRecord for OptimizationRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "tax_optimization",
        skeleton: r#"{"optimization_strategies": [""], "potential_annual_saving": 0}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormReviewRecord {
    pub is_valid: bool,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl OracleRecord for FormReviewRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "form_validation",
        skeleton: r#"{"is_valid": true, "missing_fields": [], "reasoning": ""}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusRecord {
    pub is_consistent: bool,
    pub ready_for_filing: bool,
    #[serde(default)]
    pub findings: Vec<String>,
}

impl OracleRecord for ConsensusRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "filing_consensus",
        skeleton: r#"{"is_consistent": true, "ready_for_filing": true, "findings": []}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationRecord {
    pub computation_verified: bool,
    #[serde(default)]
    pub reasoning: String,
}

impl OracleRecord for VerificationRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "computation_verification",
        skeleton: r#"{"computation_verified": true, "reasoning": ""}"#,
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct TipsRecord {
    pub tips: Vec<serde_json::Value>,
}

impl OracleRecord for TipsRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "tax_tips",
        skeleton: r#"{"tips": [{"category": "", "message": "", "potential_saving": 0}]}"#,
    };
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptionRecord {
    #[serde(default, deserialize_with = "de_amount")]
    pub salary: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub interest_income: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub tds_salary: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub tds_bank: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub section_80c: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub section_80d: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub hra_exemption: f64,
    #[serde(default)]
    pub regime: Option<String>,
}

impl DescriptionRecord {
    pub fn has_signal(&self) -> bool {
        [
            self.salary,
            self.interest_income,
            self.tds_salary,
            self.tds_bank,
            self.section_80c,
            self.section_80d,
            self.hra_exemption,
        ]
        .iter()
        .any(|v| *v > 0.0)
    }
}

impl OracleRecord for DescriptionRecord {
    const SHAPE: TargetShape = TargetShape {
        name: "description_parse",
        skeleton: r#"{"salary": 0, "interest_income": 0, "tds_salary": 0, "tds_bank": 0, "section_80c": 0, "section_80d": 0, "hra_exemption": 0, "regime": "OLD | NEW"}"#,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_names_are_unique() {
        let names = [
            ClassificationRecord::SHAPE.name,
            FieldExtractionRecord::SHAPE.name,
            IncomePlausibilityRecord::SHAPE.name,
            AggregationReviewRecord::SHAPE.name,
            ScenarioRecord::SHAPE.name,
            DeductionNarrativeRecord::SHAPE.name,
            OptimizationRecord::SHAPE.name,
            FormReviewRecord::SHAPE.name,
            ConsensusRecord::SHAPE.name,
            VerificationRecord::SHAPE.name,
            TipsRecord::SHAPE.name,
            DescriptionRecord::SHAPE.name,
        ];
        let mut sorted = names.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn extraction_record_signal() {
        let empty: FieldExtractionRecord =
            serde_json::from_str(r#"{"employer_name": "Acme"}"#).unwrap();
        assert!(!empty.has_signal());
        let some: FieldExtractionRecord =
            serde_json::from_str(r#"{"tds_bank": "1,200"}"#).unwrap();
        assert!(some.has_signal());
        assert_eq!(some.tds_bank, 1_200.0);
    }

    #[test]
    fn verdict_flag_required() {
        let result = serde_json::from_str::<IncomePlausibilityRecord>(r#"{"anomaly_score": 0.1}"#);
        assert!(result.is_err());
    }
}
