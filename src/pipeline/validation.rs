//! The two gates that can send a run to review after extraction: the income
//! sanity check ahead of aggregation and the cross-validation of the
//! finished computation.

use crate::config::PipelineSettings;
use crate::models::{
    AggregatedIncome, DeductionSummary, ItrForm, RawIncomeFields, Stage, StepRecord,
    TaxComputationResult,
};
use crate::pipeline::aggregation::anomaly_notes;
use crate::pipeline::extraction::thresholds;
use crate::pipeline::oracle::{infer_record, ConsensusRecord, IncomePlausibilityRecord, InferenceOracle};
use crate::pipeline::prompt::{build_consensus_prompt, build_plausibility_prompt};
use crate::pipeline::steps::StepTracker;

/// Result of a gate: passed, or the reasons it did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateOutcome {
    pub findings: Vec<String>,
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }
}

fn within(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

// ═══════════════════════════════════════════════════════════
// Income sanity gate
// ═══════════════════════════════════════════════════════════

pub fn negative_income_findings(income: &RawIncomeFields) -> Vec<String> {
    let mut findings = Vec::new();
    if income.gross_salary < 0.0 {
        findings.push(format!("negative salary {:.2}", income.gross_salary));
    }
    if income.interest_income < 0.0 {
        findings.push(format!("negative interest income {:.2}", income.interest_income));
    }
    findings
}

/// Negative income always fails. The oracle's plausibility verdict can fail
/// the gate; without an answer the gate passes and only notes anomalies.
pub fn run_income_validation(
    oracle: &dyn InferenceOracle,
    income: &RawIncomeFields,
) -> (GateOutcome, StepRecord) {
    let mut step = StepTracker::begin(
        Stage::IncomeValidator,
        format!(
            "salary {:.2}, interest {:.2}, TDS {:.2}/{:.2}",
            income.gross_salary, income.interest_income, income.tds_salary, income.tds_bank
        ),
    );
    let mut outcome = GateOutcome {
        findings: negative_income_findings(income),
    };
    step.detail("anomalies", anomaly_notes(income));

    let verdict = if oracle.is_live() && outcome.passed() {
        infer_record::<IncomePlausibilityRecord>(oracle, &build_plausibility_prompt(income))
            .map_err(|e| {
                tracing::warn!(stage = "INCOME_VALIDATOR", error = %e, "Plausibility check unavailable");
            })
            .ok()
    } else {
        None
    };
    step.path(verdict.is_some());
    if let Some(verdict) = verdict {
        step.detail("anomaly_score", verdict.anomaly_score);
        step.detail("reasoning", &verdict.reasoning);
        if !verdict.is_reasonable || verdict.anomaly_score >= thresholds::ANOMALY_SCORE {
            outcome.findings.push(format!(
                "income flagged as implausible (score {:.2}): {}",
                verdict.anomaly_score, verdict.reasoning
            ));
        }
    }

    step.detail("findings", &outcome.findings);
    let step = if outcome.passed() {
        step.finish("income plausible")
    } else {
        tracing::info!(stage = "INCOME_VALIDATOR", "Sanity gate triggered");
        step.fail(outcome.findings.join("; "))
    };
    (outcome, step)
}

// ═══════════════════════════════════════════════════════════
// Cross-validation gate
// ═══════════════════════════════════════════════════════════

/// Arithmetic agreement between every stage's output, within `tolerance`.
pub fn consistency_findings(
    income: &RawIncomeFields,
    aggregated: &AggregatedIncome,
    deductions: &DeductionSummary,
    result: &TaxComputationResult,
    form: &ItrForm,
    tolerance: f64,
) -> Vec<String> {
    let mut findings = Vec::new();
    let gti = aggregated.gross_total_income();

    let sources = income.gross_salary + income.interest_income + income.other_income;
    if !within(sources, gti, tolerance) {
        findings.push(format!(
            "income sources {sources:.2} do not add up to gross total income {gti:.2}"
        ));
    }

    let components = deductions.components().total();
    if !within(components, deductions.total_deductions(), tolerance) {
        findings.push(format!(
            "deduction components {components:.2} differ from total {:.2}",
            deductions.total_deductions()
        ));
    }

    let expected_taxable = (gti - deductions.total_deductions()).max(0.0);
    if !within(expected_taxable, result.taxable_income, tolerance) {
        findings.push(format!(
            "taxable income {:.2} should be {expected_taxable:.2}",
            result.taxable_income
        ));
    }

    let tc = &form.tax_computation;
    let mirrored = [
        ("gross_total_income", tc.gross_total_income, result.gross_total_income),
        ("total_deductions", tc.total_deductions, result.total_deductions),
        ("taxable_income", tc.taxable_income, result.taxable_income),
        ("tax_on_income", tc.tax_on_income, result.tax_on_income),
        ("rebate_87a", tc.rebate_87a, result.rebate_87a),
        ("cess", tc.health_education_cess, result.cess),
        ("total_tax", tc.total_tax, result.total_tax_liability),
        ("tds", tc.tds, result.total_tds),
        ("net_refund", tc.net_refund, result.net_refund),
        ("net_payable", tc.net_payable, result.net_payable),
    ];
    for (field, on_form, computed) in mirrored {
        if !within(on_form, computed, tolerance) {
            findings.push(format!("form {field} {on_form:.2} differs from computed {computed:.2}"));
        }
    }

    findings
}

/// Inputs of the cross-validation gate.
pub struct ConsensusInput<'a> {
    pub income: &'a RawIncomeFields,
    pub aggregated: &'a AggregatedIncome,
    pub deductions: &'a DeductionSummary,
    pub result: &'a TaxComputationResult,
    pub form: &'a ItrForm,
}

/// Deterministic checks decide; a live oracle may only add a failure.
pub fn run_consensus(
    oracle: &dyn InferenceOracle,
    settings: &PipelineSettings,
    input: ConsensusInput<'_>,
) -> (GateOutcome, StepRecord) {
    let mut step = StepTracker::begin(
        Stage::ConsensusValidator,
        format!(
            "GTI {:.2}, taxable {:.2}, liability {:.2}",
            input.aggregated.gross_total_income(),
            input.result.taxable_income,
            input.result.total_tax_liability
        ),
    );
    let mut outcome = GateOutcome {
        findings: consistency_findings(
            input.income,
            input.aggregated,
            input.deductions,
            input.result,
            input.form,
            settings.tolerance,
        ),
    };
    step.detail("deterministic_passed", outcome.passed());

    let opinion = if oracle.is_live() {
        let prompt = build_consensus_prompt(input.income, input.aggregated, input.deductions, input.result);
        infer_record::<ConsensusRecord>(oracle, &prompt)
            .map_err(|e| {
                tracing::warn!(stage = "CONSENSUS_VALIDATOR", error = %e, "Consensus opinion unavailable");
            })
            .ok()
    } else {
        None
    };
    step.path(opinion.is_some());
    if let Some(opinion) = opinion {
        step.detail("oracle_consistent", opinion.is_consistent);
        step.detail("oracle_ready", opinion.ready_for_filing);
        if !opinion.is_consistent || !opinion.ready_for_filing {
            if opinion.findings.is_empty() {
                outcome.findings.push("oracle: filing not ready".to_string());
            } else {
                outcome
                    .findings
                    .extend(opinion.findings.into_iter().map(|f| format!("oracle: {f}")));
            }
        }
    }

    step.detail("findings", &outcome.findings);
    let step = if outcome.passed() {
        step.finish("all figures consistent")
    } else {
        tracing::info!(stage = "CONSENSUS_VALIDATOR", findings = outcome.findings.len(), "Consensus gate triggered");
        step.fail(outcome.findings.join("; "))
    };
    (outcome, step)
}
