use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DocumentType, FilingState, Stage, StepStatus};
use super::form::ItrForm;
use super::income::{AggregatedIncome, DeductionSummary, RawDeductionFields, RawIncomeFields};
use super::tax::{ScenarioAssessment, TaxComputationResult, TaxTip};
use super::taxpayer::TaxpayerProfile;

// ═══════════════════════════════════════════
// Filing status
// ═══════════════════════════════════════════

/// Where a suspended run re-enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumePoint {
    Aggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum FilingStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "NEEDS_REVIEW")]
    NeedsReview { since: DateTime<Utc> },
    #[serde(rename = "E_VERIFIED")]
    EVerified {
        ack_number: String,
        verified_at: DateTime<Utc>,
    },
    #[serde(rename = "FAILED")]
    Failed { message: String, at: DateTime<Utc> },
}

impl FilingStatus {
    pub fn state(&self) -> FilingState {
        match self {
            Self::Pending => FilingState::Pending,
            Self::NeedsReview { .. } => FilingState::NeedsReview,
            Self::EVerified { .. } => FilingState::EVerified,
            Self::Failed { .. } => FilingState::Failed,
        }
    }

    /// Only a run suspended for review can be resumed.
    pub fn resume_point(&self) -> Option<ResumePoint> {
        match self {
            Self::NeedsReview { .. } => Some(ResumePoint::Aggregation),
            _ => None,
        }
    }

    pub fn ack_number(&self) -> Option<&str> {
        match self {
            Self::EVerified { ack_number, .. } => Some(ack_number),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EVerified { .. } | Self::Failed { .. })
    }
}

// ═══════════════════════════════════════════
// Documents
// ═══════════════════════════════════════════

/// How the numbers for one document were obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ExtractionMethod {
    Oracle,
    /// The oracle was live but errored or returned nothing usable.
    OracleFallback { reason: String },
    /// The oracle is not configured; heuristics were the only option.
    Heuristic,
    /// Nothing to extract for this document type, or no readable text.
    Skipped { reason: String },
}

impl ExtractionMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::OracleFallback { .. } => "oracle_fallback",
            Self::Heuristic => "heuristic",
            Self::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: Uuid,
    pub filename: String,
    pub doc_type: DocumentType,
    pub confidence: f32,
    pub classified_by: String,
    pub content_hash: String,
    pub raw_text: String,
    pub source_error: Option<String>,
    pub extraction: Option<ExtractionMethod>,
}

// ═══════════════════════════════════════════
// Step history
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: Uuid,
    pub name: Stage,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input_summary: String,
    pub output_summary: String,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub error: Option<String>,
}

// ═══════════════════════════════════════════
// Run record
// ═══════════════════════════════════════════

/// Aggregate root of one filing attempt, initial pass plus any resumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub taxpayer: TaxpayerProfile,
    pub documents: Vec<DocumentRecord>,
    pub income: RawIncomeFields,
    pub deductions_claimed: RawDeductionFields,
    pub aggregated: Option<AggregatedIncome>,
    pub deduction_summary: Option<DeductionSummary>,
    pub computation: Option<TaxComputationResult>,
    pub itr_form: Option<ItrForm>,
    pub scenario: Option<ScenarioAssessment>,
    pub status: FilingStatus,
    pub review_reason: Option<String>,
    pub tax_tips: Vec<TaxTip>,
    pub steps: Vec<StepRecord>,
}

impl RunRecord {
    pub fn new(taxpayer: TaxpayerProfile) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            taxpayer,
            documents: Vec::new(),
            income: RawIncomeFields::default(),
            deductions_claimed: RawDeductionFields::default(),
            aggregated: None,
            deduction_summary: None,
            computation: None,
            itr_form: None,
            scenario: None,
            status: FilingStatus::Pending,
            review_reason: None,
            tax_tips: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn state(&self) -> FilingState {
        self.status.state()
    }

    /// Clears everything a computation pass produces, ahead of a re-run.
    pub fn reset_computed(&mut self) {
        self.aggregated = None;
        self.deduction_summary = None;
        self.computation = None;
        self.itr_form = None;
        self.scenario = None;
        self.tax_tips.clear();
        self.review_reason = None;
        self.status = FilingStatus::Pending;
    }

    /// Stable ordering by start time; ties keep insertion order.
    pub fn sort_steps(&mut self) {
        self.steps.sort_by_key(|s| s.started_at);
    }

    pub fn step(&self, name: Stage) -> Option<&StepRecord> {
        self.steps.iter().rev().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_needs_review_is_resumable() {
        let now = Utc::now();
        assert_eq!(
            FilingStatus::NeedsReview { since: now }.resume_point(),
            Some(ResumePoint::Aggregation)
        );
        assert!(FilingStatus::Pending.resume_point().is_none());
        assert!(FilingStatus::Failed {
            message: "bad pan".into(),
            at: now
        }
        .resume_point()
        .is_none());
        assert!(FilingStatus::EVerified {
            ack_number: "ITR2025301234567".into(),
            verified_at: now
        }
        .resume_point()
        .is_none());
    }

    #[test]
    fn ack_only_when_verified() {
        let now = Utc::now();
        let verified = FilingStatus::EVerified {
            ack_number: "ITR20253012345678".into(),
            verified_at: now,
        };
        assert_eq!(verified.ack_number(), Some("ITR20253012345678"));
        assert!(verified.is_terminal());
        assert!(FilingStatus::NeedsReview { since: now }.ack_number().is_none());
    }

    #[test]
    fn status_serializes_tagged() {
        let status = FilingStatus::EVerified {
            ack_number: "ITR1".into(),
            verified_at: Utc::now(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "E_VERIFIED");
        assert_eq!(value["ack_number"], "ITR1");

        let pending = serde_json::to_value(FilingStatus::Pending).unwrap();
        assert_eq!(pending["state"], "PENDING");
    }

    #[test]
    fn extraction_method_serializes_tagged() {
        let method = ExtractionMethod::OracleFallback {
            reason: "timeout".into(),
        };
        let value = serde_json::to_value(&method).unwrap();
        assert_eq!(value["method"], "oracle_fallback");
        assert_eq!(value["reason"], "timeout");
    }

    #[test]
    fn new_run_is_pending_with_identity() {
        let run = RunRecord::new(TaxpayerProfile::default());
        assert_eq!(run.state(), FilingState::Pending);
        assert!(run.steps.is_empty());
        assert_eq!(run.created_at, run.updated_at);
    }

    #[test]
    fn reset_clears_review_reason_and_status() {
        let mut run = RunRecord::new(TaxpayerProfile::default());
        run.review_reason = Some("low confidence".into());
        run.status = FilingStatus::NeedsReview { since: Utc::now() };
        run.reset_computed();
        assert!(run.review_reason.is_none());
        assert_eq!(run.state(), FilingState::Pending);
    }
}
