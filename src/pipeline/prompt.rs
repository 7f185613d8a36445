//! Prompt builders for every oracle call site.
//!
//! Prompts carry figures, never instructions about the output format: the
//! JSON skeleton travels separately as the record's [`TargetShape`].
//!
//! [`TargetShape`]: crate::pipeline::oracle::TargetShape

use crate::models::{
    AggregatedIncome, DeductionSummary, DocumentType, ItrForm, RawIncomeFields,
    TaxComputationResult, TaxRegime, TaxpayerProfile,
};

/// Characters of document text sent for classification.
const CLASSIFY_SNIPPET: usize = 2_000;
/// Characters of document text sent for field extraction.
const EXTRACT_SNIPPET: usize = 4_000;

fn snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn build_classification_prompt(filename: &str, text: &str) -> String {
    format!(
        "Classify this Indian tax document as FORM_16 (employer TDS certificate), \
         BANK_INT (bank interest certificate or statement), FORM_26AS (annual tax statement) \
         or OTHER. Give a confidence between 0 and 1.\n\
         Filename: {filename}\n\
         <document>\n{}\n</document>",
        snippet(text, CLASSIFY_SNIPPET)
    )
}

pub fn build_extraction_prompt(doc_type: DocumentType, text: &str) -> String {
    format!(
        "Extract the exact financial figures from this {doc_type} document. \
         Amounts are plain numbers without commas. Use 0 for anything not present. \
         Interest paid on a home loan is home_loan_interest, not interest_income.\n\
         <document>\n{}\n</document>",
        snippet(text, EXTRACT_SNIPPET)
    )
}

pub fn build_plausibility_prompt(income: &RawIncomeFields) -> String {
    format!(
        "Assess whether these income figures for an Indian salaried taxpayer are plausible. \
         Score anomalies from 0 (normal) to 1 (clearly wrong).\n\
         Gross salary: {:.2}\nSalary TDS: {:.2}\nInterest income: {:.2}\nBank TDS: {:.2}\nOther income: {:.2}",
        income.gross_salary,
        income.tds_salary,
        income.interest_income,
        income.tds_bank,
        income.other_income
    )
}

pub fn build_aggregation_review_prompt(raw: &RawIncomeFields, aggregated: &AggregatedIncome) -> String {
    format!(
        "Review this income aggregation and list anomalies.\n\
         Inputs: salary {:.2}, interest {:.2}, other {:.2}, salary TDS {:.2}, bank TDS {:.2}\n\
         Result: gross total income {:.2}, total TDS {:.2}",
        raw.gross_salary,
        raw.interest_income,
        raw.other_income,
        raw.tds_salary,
        raw.tds_bank,
        aggregated.gross_total_income(),
        aggregated.total_tds()
    )
}

pub fn build_scenario_prompt(taxpayer: &TaxpayerProfile, aggregated: &AggregatedIncome) -> String {
    format!(
        "Classify the tax scenario of this taxpayer as SALARIED_BASIC, HIGH_EARNER, \
         COMPLEX_CAPITAL_GAINS or SENIOR_CITIZEN, with a risk level.\n\
         Age: {}\nSalary: {:.2}\nInterest: {:.2}\nOther income: {:.2}\nGross total income: {:.2}",
        taxpayer.age,
        aggregated.total_salary(),
        aggregated.total_interest(),
        aggregated.total_other(),
        aggregated.gross_total_income()
    )
}

pub fn build_deduction_prompt(summary: &DeductionSummary, regime: TaxRegime) -> String {
    format!(
        "Explain these deductions to the taxpayer in short bullet points. \
         Do not change any figure.\n\
         Regime: {regime}\nStandard deduction: {:.2}\nSection 80C: {:.2}\nSection 80D: {:.2}\n\
         HRA exemption: {:.2}\nOther: {:.2}\nTotal: {:.2}",
        summary.standard_deduction(),
        summary.section_80c(),
        summary.section_80d(),
        summary.hra_exemption(),
        summary.other(),
        summary.total_deductions()
    )
}

pub fn build_optimization_prompt(taxpayer: &TaxpayerProfile, result: &TaxComputationResult) -> String {
    format!(
        "Suggest legal tax optimisation strategies for next year.\n\
         Age: {}\nRegime: {}\nGross total income: {:.2}\nDeductions: {:.2}\nTax liability: {:.2}",
        taxpayer.age,
        result.regime,
        result.gross_total_income,
        result.total_deductions,
        result.total_tax_liability
    )
}

pub fn build_form_review_prompt(form: &ItrForm) -> String {
    let amounts = form
        .amounts()
        .iter()
        .map(|(name, value)| format!("{name}: {value:.2}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Check this {} return for missing or inconsistent fields.\n\
         Name: {}\nPAN: {}\nAssessment year: {}\n{amounts}",
        form.itr_type, form.part_a.name, form.part_a.pan, form.part_a.assessment_year
    )
}

pub fn build_consensus_prompt(
    income: &RawIncomeFields,
    aggregated: &AggregatedIncome,
    deductions: &DeductionSummary,
    result: &TaxComputationResult,
) -> String {
    format!(
        "Cross-check this filing for consistency before submission.\n\
         Salary {:.2} + interest {:.2} + other {:.2} = gross total income {:.2}\n\
         Deductions {:.2}, taxable income {:.2}\n\
         Tax {:.2}, rebate {:.2}, cess {:.2}, liability {:.2}, TDS {:.2}",
        income.gross_salary,
        income.interest_income,
        income.other_income,
        aggregated.gross_total_income(),
        deductions.total_deductions(),
        result.taxable_income,
        result.tax_on_income,
        result.rebate_87a,
        result.cess,
        result.total_tax_liability,
        result.total_tds
    )
}

pub fn build_verification_prompt(taxpayer: &TaxpayerProfile, result: &TaxComputationResult) -> String {
    format!(
        "Verify this tax computation before e-verification.\n\
         PAN: {}\nRegime: {}\nTaxable income: {:.2}\nTax liability: {:.2}\nTDS: {:.2}\n\
         Refund: {:.2}\nPayable: {:.2}",
        taxpayer.pan,
        result.regime,
        result.taxable_income,
        result.total_tax_liability,
        result.total_tds,
        result.net_refund,
        result.net_payable
    )
}

pub fn build_tips_prompt(
    taxpayer: &TaxpayerProfile,
    deductions: &DeductionSummary,
    result: &TaxComputationResult,
) -> String {
    format!(
        "Give personalised tax-saving tips for next year, each with an estimated saving.\n\
         Age: {}\nRegime: {}\nGross total income: {:.2}\nSection 80C: {:.2}\nSection 80D: {:.2}\n\
         Tax liability: {:.2}",
        taxpayer.age,
        result.regime,
        result.gross_total_income,
        deductions.section_80c(),
        deductions.section_80d(),
        result.total_tax_liability
    )
}

pub fn build_description_prompt(text: &str) -> String {
    format!(
        "Read this description of a taxpayer's finances and extract annual amounts in rupees \
         (1 lakh = 100000). Use 0 for anything not mentioned.\n<description>\n{text}\n</description>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "₹".repeat(10);
        assert_eq!(snippet(&text, 3), "₹₹₹");
        assert_eq!(snippet("short", 100), "short");
    }

    #[test]
    fn extraction_prompt_truncates_document() {
        let text = "x".repeat(10_000);
        let prompt = build_extraction_prompt(DocumentType::Form16, &text);
        assert!(prompt.contains("FORM_16"));
        assert!(prompt.len() < 5_000);
    }

    #[test]
    fn plausibility_prompt_lists_figures() {
        let income = RawIncomeFields {
            gross_salary: 850_000.0,
            tds_bank: 4_000.0,
            ..Default::default()
        };
        let prompt = build_plausibility_prompt(&income);
        assert!(prompt.contains("850000.00"));
        assert!(prompt.contains("4000.00"));
    }
}
