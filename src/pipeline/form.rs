//! ITR-1 filling and the form-level review.

use crate::models::{
    AggregatedIncome, DeductionSummary, FormTaxComputation, ItrForm, PartA, ScheduleOtherSources,
    ScheduleSalary, ScheduleVia, Stage, StepRecord, TaxComputationResult, TaxpayerProfile,
};
use crate::pipeline::oracle::{infer_record, FormReviewRecord, InferenceOracle};
use crate::pipeline::prompt::build_form_review_prompt;
use crate::pipeline::steps::StepTracker;

pub const ITR_1: &str = "ITR-1";

/// Outcome of the form review.
#[derive(Debug, Clone, PartialEq)]
pub struct FormReview {
    pub passed: bool,
    pub findings: Vec<String>,
}

// ═══════════════════════════════════════════════════════════
// Filling
// ═══════════════════════════════════════════════════════════

pub fn fill_itr1(
    taxpayer: &TaxpayerProfile,
    employer_name: &str,
    aggregated: &AggregatedIncome,
    deductions: &DeductionSummary,
    result: &TaxComputationResult,
) -> ItrForm {
    let gross_salary = aggregated.total_salary();
    let standard = deductions.standard_deduction();
    let exempt = deductions.hra_exemption();

    ItrForm {
        itr_type: ITR_1.to_string(),
        part_a: PartA {
            name: taxpayer.name.trim().to_string(),
            pan: taxpayer.pan.trim().to_uppercase(),
            age: taxpayer.age,
            financial_year: taxpayer.financial_year.clone(),
            assessment_year: taxpayer.assessment_year().unwrap_or_default(),
            residential_status: taxpayer.residential_status.clone(),
            employer_name: employer_name.to_string(),
        },
        schedule_salary: ScheduleSalary {
            gross_salary,
            standard_deduction_u16: standard,
            exempt_allowances: exempt,
            net_salary: (gross_salary - standard - exempt).max(0.0),
        },
        schedule_other_sources: ScheduleOtherSources {
            interest_income: aggregated.total_interest(),
            other_income: aggregated.total_other(),
            total: aggregated.total_interest() + aggregated.total_other(),
        },
        schedule_via: ScheduleVia {
            sec_80c: deductions.section_80c(),
            sec_80d: deductions.section_80d(),
            total: deductions.section_80c() + deductions.section_80d(),
        },
        tax_computation: FormTaxComputation {
            gross_total_income: result.gross_total_income,
            total_deductions: result.total_deductions,
            taxable_income: result.taxable_income,
            tax_on_income: result.tax_on_income,
            rebate_87a: result.rebate_87a,
            surcharge: 0.0,
            health_education_cess: result.cess,
            total_tax: result.total_tax_liability,
            tds: result.total_tds,
            net_refund: result.net_refund,
            net_payable: result.net_payable,
        },
    }
}

pub fn run_form_fill(
    taxpayer: &TaxpayerProfile,
    employer_name: &str,
    aggregated: &AggregatedIncome,
    deductions: &DeductionSummary,
    result: &TaxComputationResult,
) -> (ItrForm, StepRecord) {
    let mut step = StepTracker::begin(
        Stage::FormFiller,
        format!("{} regime, taxable {:.2}", result.regime, result.taxable_income),
    );
    let form = fill_itr1(taxpayer, employer_name, aggregated, deductions, result);
    step.detail("itr_type", &form.itr_type);
    step.detail("assessment_year", &form.part_a.assessment_year);
    let summary = format!("{} for AY {}", form.itr_type, form.part_a.assessment_year);
    (form, step.finish(summary))
}

// ═══════════════════════════════════════════════════════════
// Review
// ═══════════════════════════════════════════════════════════

/// Required fields and amount ranges. Empty means the form is complete.
pub fn check_required_fields(form: &ItrForm) -> Vec<String> {
    let mut findings = Vec::new();
    if form.part_a.name.is_empty() {
        findings.push("name is missing".to_string());
    }
    if form.part_a.pan.is_empty() {
        findings.push("PAN is missing".to_string());
    }
    if form.part_a.assessment_year.is_empty() {
        findings.push(format!(
            "assessment year cannot be derived from financial year '{}'",
            form.part_a.financial_year
        ));
    }
    for (field, value) in form.amounts() {
        if !value.is_finite() {
            findings.push(format!("{field} is not a number"));
        } else if value < 0.0 {
            findings.push(format!("{field} is negative ({value:.2})"));
        }
    }
    findings
}

/// Deterministic checks first; a live oracle can add findings but its
/// errors are ignored.
pub fn review_form(oracle: &dyn InferenceOracle, form: &ItrForm) -> (FormReview, bool) {
    let mut findings = check_required_fields(form);
    let mut passed = findings.is_empty();

    let opinion = if oracle.is_live() {
        infer_record::<FormReviewRecord>(oracle, &build_form_review_prompt(form))
            .map_err(|e| {
                tracing::warn!(stage = "FORM_VALIDATOR", error = %e, "Form review unavailable");
            })
            .ok()
    } else {
        None
    };
    let oracle_used = opinion.is_some();
    if let Some(opinion) = opinion {
        if !opinion.is_valid {
            passed = false;
            findings.extend(
                opinion
                    .missing_fields
                    .into_iter()
                    .map(|f| format!("oracle: missing {f}")),
            );
            if !opinion.reasoning.is_empty() {
                findings.push(format!("oracle: {}", opinion.reasoning));
            }
            if findings.is_empty() {
                findings.push("oracle: form not valid".to_string());
            }
        }
    }

    (FormReview { passed, findings }, oracle_used)
}

pub fn run_form_validation(oracle: &dyn InferenceOracle, form: &ItrForm) -> (FormReview, StepRecord) {
    let mut step = StepTracker::begin(
        Stage::FormValidator,
        format!("{} for {}", form.itr_type, form.part_a.pan),
    );
    let (review, oracle_used) = review_form(oracle, form);
    step.path(oracle_used);
    step.detail("passed", review.passed);
    step.detail("findings", &review.findings);

    let step = if review.passed {
        step.finish("form complete")
    } else {
        step.fail(format!("form incomplete: {}", review.findings.join("; ")))
    };
    (review, step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeductionComponents, RawIncomeFields, TaxRegime};
    use crate::pipeline::oracle::{HeuristicOracle, MockOracle, MockReply};
    use crate::pipeline::tax::compute;
    use crate::rules::TaxRules;

    fn filled(taxpayer: &TaxpayerProfile) -> ItrForm {
        let aggregated = AggregatedIncome::from_sources(&RawIncomeFields {
            gross_salary: 1_500_000.0,
            tds_salary: 150_000.0,
            interest_income: 50_000.0,
            tds_bank: 5_000.0,
            ..Default::default()
        });
        let deductions = DeductionSummary::new(
            DeductionComponents {
                standard: 50_000.0,
                section_80c: 150_000.0,
                section_80d: 25_000.0,
                hra_exemption: 300_000.0,
                other: 0.0,
            },
            Vec::new(),
        );
        let result = compute(&TaxRules::default(), &aggregated, &deductions, TaxRegime::Old);
        fill_itr1(taxpayer, "Acme Corp", &aggregated, &deductions, &result)
    }

    #[test]
    fn schedules_mirror_computation() {
        let form = filled(&TaxpayerProfile::default());
        assert_eq!(form.itr_type, "ITR-1");
        assert_eq!(form.part_a.assessment_year, "2025-26");
        assert_eq!(form.schedule_salary.net_salary, 1_150_000.0);
        assert_eq!(form.schedule_other_sources.total, 50_000.0);
        assert_eq!(form.schedule_via.total, 175_000.0);
        assert_eq!(form.tax_computation.taxable_income, 1_025_000.0);
        assert_eq!(form.tax_computation.surcharge, 0.0);
        assert_eq!(form.tax_computation.net_refund, 30_200.0);
    }

    #[test]
    fn complete_form_has_no_findings() {
        let form = filled(&TaxpayerProfile::default());
        assert!(check_required_fields(&form).is_empty());
    }

    #[test]
    fn missing_identity_and_year_reported() {
        let taxpayer = TaxpayerProfile {
            name: "  ".into(),
            financial_year: "FY?".into(),
            ..Default::default()
        };
        let findings = check_required_fields(&filled(&taxpayer));
        assert!(findings.iter().any(|f| f.contains("name")));
        assert!(findings.iter().any(|f| f.contains("assessment year")));
    }

    #[test]
    fn negative_amount_reported() {
        let mut form = filled(&TaxpayerProfile::default());
        form.tax_computation.tds = -1.0;
        let findings = check_required_fields(&form);
        assert_eq!(findings, vec!["tds is negative (-1.00)".to_string()]);
    }

    #[test]
    fn oracle_can_fail_a_complete_form() {
        let oracle = MockOracle::new().with_value(
            "form_validation",
            serde_json::json!({"is_valid": false, "missing_fields": ["bank account"]}),
        );
        let (review, step) = run_form_validation(&oracle, &filled(&TaxpayerProfile::default()));
        assert!(!review.passed);
        assert_eq!(review.findings, vec!["oracle: missing bank account".to_string()]);
        assert!(step.error.is_some());
    }

    #[test]
    fn bare_oracle_rejection_still_explains_itself() {
        let oracle = MockOracle::new().with_value("form_validation", serde_json::json!({"is_valid": false}));
        let (review, step) = run_form_validation(&oracle, &filled(&TaxpayerProfile::default()));
        assert!(!review.passed);
        assert_eq!(review.findings, vec!["oracle: form not valid".to_string()]);
        assert_eq!(step.error.as_deref(), Some("form incomplete: oracle: form not valid"));
    }

    #[test]
    fn oracle_error_never_fails_the_form() {
        let oracle = MockOracle::new().with_reply("form_validation", MockReply::Timeout);
        let (review, step) = run_form_validation(&oracle, &filled(&TaxpayerProfile::default()));
        assert!(review.passed);
        assert_eq!(step.details["path"], "fallback");

        let (review, _) = run_form_validation(&HeuristicOracle, &filled(&TaxpayerProfile::default()));
        assert!(review.passed);
    }
}
