//! Filing pipeline: one pass from documents or manual figures to a resolved
//! run, plus the resume pass for runs held for review.
//!
//! Stages run strictly in order and every stage appends a step to the run.
//! Business outcomes (review, failure) are states on the returned
//! [`RunRecord`], never errors; only call-contract violations return `Err`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::db::DatabaseError;
use crate::models::{
    AggregatedIncome, DeductionSummary, ExtractionMethod, FilingInput, FilingState, FilingStatus,
    ItrForm, ManualInput, RawDeductionFields, RawDocument, RawIncomeFields, ResumePoint, RunRecord,
    Stage, TaxComputationResult,
};
use crate::pipeline::aggregation::run_aggregation;
use crate::pipeline::deductions::run_deductions;
use crate::pipeline::extraction::{classify_document, extract_documents, gate_documents};
use crate::pipeline::form::{run_form_fill, run_form_validation};
use crate::pipeline::import::content_hash;
use crate::pipeline::oracle::InferenceOracle;
use crate::pipeline::scenario::run_scenario;
use crate::pipeline::steps::StepTracker;
use crate::pipeline::tax::run_computation;
use crate::pipeline::tips::generate_tips;
use crate::pipeline::validation::{run_consensus, run_income_validation, ConsensusInput};
use crate::pipeline::verification::run_everification;
use crate::rules::TaxRules;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Run {run_id} is {state} and cannot be resumed")]
    NotResumable { run_id: Uuid, state: FilingState },

    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

pub struct FilingPipeline {
    oracle: Arc<dyn InferenceOracle>,
    rules: TaxRules,
    settings: PipelineSettings,
}

impl FilingPipeline {
    pub fn new(oracle: Arc<dyn InferenceOracle>, rules: TaxRules, settings: PipelineSettings) -> Self {
        Self {
            oracle,
            rules,
            settings,
        }
    }

    pub fn oracle(&self) -> &dyn InferenceOracle {
        self.oracle.as_ref()
    }

    pub fn rules(&self) -> &TaxRules {
        &self.rules
    }

    /// Run a new filing from documents or manual figures.
    pub fn run(&self, input: FilingInput) -> RunRecord {
        let pass_start = Utc::now();
        let mut run = RunRecord::new(input.taxpayer().clone());
        let _span = tracing::info_span!("filing_run", run_id = %run.run_id).entered();

        let entry = match &input {
            FilingInput::Documents { documents, .. } => format!("{} documents", documents.len()),
            FilingInput::Manual(_) => "manual input".to_string(),
        };
        let mut supervisor = StepTracker::begin_at(Stage::Supervisor, entry, pass_start);
        supervisor.detail("oracle_live", self.oracle.is_live());
        supervisor.detail("model", self.oracle.model_name());

        match input {
            FilingInput::Documents { documents, .. } => {
                supervisor.detail("entry", "documents");
                let reasons = self.intake_documents(&mut run, documents);
                if reasons.is_empty() {
                    self.compute_pass(&mut run);
                } else {
                    hold_for_review(&mut run, reasons);
                }
            }
            FilingInput::Manual(manual) => {
                supervisor.detail("entry", "manual");
                let notes = manual_notes(&manual);
                if !notes.is_empty() {
                    supervisor.detail("review_notes", &notes);
                }
                run.income = manual.income_fields();
                run.deductions_claimed = manual.deduction_fields();
                self.compute_pass(&mut run);
            }
        }

        close_pass(&mut run, supervisor, 0);
        run
    }

    /// Re-run a reviewed filing from aggregation with corrected figures.
    /// Classification and extraction are not repeated; the run keeps its
    /// identity and its earlier steps.
    pub fn resume(
        &self,
        run: &RunRecord,
        income: RawIncomeFields,
        deductions: RawDeductionFields,
    ) -> Result<RunRecord, PipelineError> {
        match run.status.resume_point() {
            Some(ResumePoint::Aggregation) => {}
            None => {
                return Err(PipelineError::NotResumable {
                    run_id: run.run_id,
                    state: run.state(),
                })
            }
        }

        let pass_start = Utc::now();
        let _span = tracing::info_span!("filing_resume", run_id = %run.run_id).entered();
        let mut resumed = run.clone();
        let pass_index = resumed.steps.len();
        let previous_reason = resumed.review_reason.clone();

        resumed.income = income;
        resumed.deductions_claimed = deductions;
        resumed.reset_computed();

        let mut supervisor = StepTracker::begin_at(Stage::Supervisor, "resume with corrected figures", pass_start);
        supervisor.detail("entry", "resume");
        supervisor.detail("previous_review_reason", previous_reason);
        supervisor.detail("oracle_live", self.oracle.is_live());

        self.compute_pass(&mut resumed);
        close_pass(&mut resumed, supervisor, pass_index);
        Ok(resumed)
    }

    // ═══════════════════════════════════════════════════════════
    // Document intake
    // ═══════════════════════════════════════════════════════════

    /// Classification, extraction and the confidence gate.
    /// Returns the gate's reasons; empty means the run may proceed.
    fn intake_documents(&self, run: &mut RunRecord, documents: Vec<RawDocument>) -> Vec<String> {
        let oracle = self.oracle.as_ref();

        let mut classifier = StepTracker::begin(Stage::DocumentClassifier, format!("{} documents", documents.len()));
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        let mut reasoning = Vec::new();
        for doc in &documents {
            let has_text = doc.is_readable() && !doc.text.trim().is_empty();
            if has_text && !seen.insert(content_hash(&doc.text)) {
                duplicates.push(doc.filename.clone());
                continue;
            }
            let (record, why) = classify_document(oracle, doc);
            if let Some(why) = why {
                reasoning.push(format!("{}: {why}", record.filename));
            }
            run.documents.push(record);
        }
        classifier.path(run.documents.iter().any(|d| d.classified_by.starts_with("oracle")));
        classifier.detail(
            "documents",
            run.documents
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "filename": d.filename,
                        "doc_type": d.doc_type,
                        "confidence": d.confidence,
                        "classified_by": d.classified_by,
                        "source_error": d.source_error,
                    })
                })
                .collect::<Vec<_>>(),
        );
        classifier.detail("duplicates", &duplicates);
        if !reasoning.is_empty() {
            classifier.detail("reasoning", &reasoning);
        }
        let summary = run
            .documents
            .iter()
            .map(|d| format!("{} -> {} ({:.2})", d.filename, d.doc_type, d.confidence))
            .collect::<Vec<_>>()
            .join(", ");
        run.steps.push(classifier.finish(summary));

        let mut extraction = StepTracker::begin(
            Stage::FieldExtraction,
            format!("{} classified documents", run.documents.len()),
        );
        let outcome = extract_documents(oracle, &mut run.documents);
        run.income = outcome.income;
        run.deductions_claimed = outcome.deductions;
        extraction.path(
            run.documents
                .iter()
                .any(|d| d.extraction == Some(ExtractionMethod::Oracle)),
        );
        extraction.detail(
            "methods",
            run.documents
                .iter()
                .map(|d| serde_json::json!({"filename": d.filename, "extraction": d.extraction}))
                .collect::<Vec<_>>(),
        );
        extraction.detail("income", &run.income);
        extraction.detail("deductions", &run.deductions_claimed);
        extraction.detail("clamp_notes", &outcome.clamp_notes);

        let mut reasons = gate_documents(&run.documents, &self.settings);
        if run.documents.is_empty() {
            reasons.push("no documents to extract from".to_string());
        } else if !run.income.has_signal() {
            reasons.push("no income figures could be extracted".to_string());
        }
        extraction.detail("review_reasons", &reasons);
        let summary = format!(
            "salary {:.2}, interest {:.2}, TDS {:.2}",
            run.income.gross_salary,
            run.income.interest_income,
            run.income.tds_salary + run.income.tds_bank
        );
        run.steps.push(extraction.finish(summary));

        if !reasons.is_empty() {
            tracing::info!(reasons = reasons.len(), "Confidence gate triggered");
        }
        reasons
    }

    // ═══════════════════════════════════════════════════════════
    // Computation phase
    // ═══════════════════════════════════════════════════════════

    /// Sanity gate through e-verification. Sets the run's status.
    fn compute_pass(&self, run: &mut RunRecord) {
        let oracle = self.oracle.as_ref();

        let (sanity, step) = run_income_validation(oracle, &run.income);
        run.steps.push(step);
        if !sanity.passed() {
            hold_for_review(run, sanity.findings);
            return;
        }

        let (aggregated, step) = run_aggregation(oracle, &run.income);
        run.steps.push(step);

        let (scenario, step) = run_scenario(oracle, &self.rules, &run.taxpayer, &aggregated);
        run.steps.push(step);
        run.scenario = Some(scenario);

        let (deductions, step) =
            run_deductions(oracle, &self.rules, &run.deductions_claimed, &aggregated, &run.taxpayer);
        run.steps.push(step);

        let (result, step) = run_computation(oracle, &self.rules, &aggregated, &deductions, &run.taxpayer);
        run.steps.push(step);

        let (form, step) = run_form_fill(
            &run.taxpayer,
            &run.income.employer_name,
            &aggregated,
            &deductions,
            &result,
        );
        run.steps.push(step);

        let (review, step) = run_form_validation(oracle, &form);
        run.steps.push(step);

        let held = if review.passed {
            let (consensus, step) = run_consensus(
                oracle,
                &self.settings,
                ConsensusInput {
                    income: &run.income,
                    aggregated: &aggregated,
                    deductions: &deductions,
                    result: &result,
                    form: &form,
                },
            );
            run.steps.push(step);
            (!consensus.passed()).then_some(consensus.findings)
        } else {
            Some(review.findings)
        };
        if let Some(reasons) = held {
            store_results(run, aggregated, deductions, result, form);
            hold_for_review(run, reasons);
            return;
        }

        let (tips, from_oracle) = generate_tips(oracle, &self.rules, &run.taxpayer, &deductions, &result);
        tracing::debug!(tips = tips.len(), from_oracle, "Tax tips generated");
        run.tax_tips = tips;

        let (verification, step) = run_everification(oracle, &run.taxpayer, &result);
        run.steps.push(step);
        store_results(run, aggregated, deductions, result, form);

        let (status, reason) = verification.into_status();
        run.status = status;
        run.review_reason = reason;
    }
}

fn store_results(
    run: &mut RunRecord,
    aggregated: AggregatedIncome,
    deductions: DeductionSummary,
    result: TaxComputationResult,
    form: ItrForm,
) {
    run.aggregated = Some(aggregated);
    run.deduction_summary = Some(deductions);
    run.computation = Some(result);
    run.itr_form = Some(form);
}

fn hold_for_review(run: &mut RunRecord, reasons: Vec<String>) {
    let reason = reasons.join("; ");
    tracing::info!(run_id = %run.run_id, reason = %reason, "Run held for review");
    run.status = FilingStatus::NeedsReview { since: Utc::now() };
    run.review_reason = Some(reason);
}

/// Notes for figures entered by hand that the aggregator will clamp.
fn manual_notes(manual: &ManualInput) -> Vec<String> {
    let mut notes = Vec::new();
    if manual.tds_salary > manual.salary {
        notes.push(format!(
            "salary TDS {:.2} exceeds salary {:.2}",
            manual.tds_salary, manual.salary
        ));
    }
    if manual.tds_bank > manual.interest_income {
        notes.push(format!(
            "bank TDS {:.2} exceeds interest {:.2}",
            manual.tds_bank, manual.interest_income
        ));
    }
    notes
}

/// Close the pass's SUPERVISOR step with the resolved outcome and slot it in
/// ahead of the pass's other steps.
fn close_pass(run: &mut RunRecord, mut supervisor: StepTracker, pass_index: usize) {
    supervisor.detail("state", run.state());
    let outcome = match &run.status {
        FilingStatus::EVerified { ack_number, .. } => format!("E_VERIFIED, acknowledgement {ack_number}"),
        FilingStatus::NeedsReview { .. } => format!(
            "NEEDS_REVIEW: {}",
            run.review_reason.as_deref().unwrap_or("review required")
        ),
        FilingStatus::Failed { message, .. } => format!("FAILED: {message}"),
        FilingStatus::Pending => "PENDING".to_string(),
    };
    if let Some(result) = &run.computation {
        supervisor.detail("outcome", result.outcome_label());
    }
    let record = supervisor.finish(outcome);
    let index = pass_index.min(run.steps.len());
    run.steps.insert(index, record);
    run.sort_steps();
    run.updated_at = Utc::now();

    tracing::info!(
        run_id = %run.run_id,
        state = run.state().as_str(),
        steps = run.steps.len(),
        "Filing pass complete"
    );
}
