//! Slab tax computation for either regime.

use crate::models::{
    AggregatedIncome, DeductionSummary, RegimeComparison, SlabLine, Stage, StepRecord,
    TaxComputationResult, TaxRegime, TaxpayerProfile,
};
use crate::pipeline::oracle::{infer_record, InferenceOracle, OptimizationRecord};
use crate::pipeline::prompt::build_optimization_prompt;
use crate::pipeline::steps::StepTracker;
use crate::rules::{RegimeRules, Slab, TaxRules};

pub const FALLBACK_STRATEGIES: [&str; 3] = [
    "Maximize Section 80C investments (up to ₹1,50,000) for tax deduction",
    "Claim health insurance premium under Section 80D",
    "Compare the old and new regimes and switch if the other costs less",
];

/// Round to paise.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn band_label(slab: &Slab) -> String {
    match slab.upper {
        Some(upper) => format!("{:.0} - {:.0}", slab.lower, upper),
        None => format!("{:.0} and above", slab.lower),
    }
}

/// Marginal slab tax: each rupee taxed once, at the rate of its band.
pub fn slab_tax(slabs: &[Slab], taxable: f64) -> (f64, Vec<SlabLine>) {
    let mut tax = 0.0;
    let mut lines = Vec::new();

    for slab in slabs {
        if taxable <= slab.lower {
            break;
        }
        let top = slab.upper.map_or(taxable, |u| taxable.min(u));
        let income_in_band = top - slab.lower;
        let band_tax = income_in_band * slab.rate;
        tax += band_tax;
        lines.push(SlabLine {
            band: band_label(slab),
            lower: slab.lower,
            upper: slab.upper,
            rate: slab.rate,
            income_in_band: round2(income_in_band),
            tax: round2(band_tax),
        });
    }

    (tax, lines)
}

/// One regime's result for a given income and deduction total, no comparison.
pub fn compute_for_regime(
    rules: &RegimeRules,
    regime: TaxRegime,
    gross_total_income: f64,
    total_deductions: f64,
    total_tds: f64,
) -> TaxComputationResult {
    let total_tds = round2(total_tds);
    let taxable_income = round2((gross_total_income - total_deductions).max(0.0));
    let (tax, slab_breakdown) = slab_tax(&rules.slabs, taxable_income);
    let tax_on_income = round2(tax);

    let rebate_87a = if taxable_income <= rules.rebate.max_income {
        tax_on_income.min(rules.rebate.max_rebate)
    } else {
        0.0
    };
    let tax_after_rebate = (tax_on_income - rebate_87a).max(0.0);
    let cess = round2(tax_after_rebate * rules.cess_rate);
    let total_tax_liability = round2(tax_after_rebate + cess);

    TaxComputationResult {
        regime,
        gross_total_income,
        total_deductions,
        taxable_income,
        tax_on_income,
        rebate_87a,
        cess,
        total_tax_liability,
        total_tds,
        net_refund: round2((total_tds - total_tax_liability).max(0.0)),
        net_payable: round2((total_tax_liability - total_tds).max(0.0)),
        slab_breakdown,
        comparison: None,
    }
}

/// Deduction total a regime actually applies.
pub fn applied_deductions(
    rules: &TaxRules,
    regime: TaxRegime,
    gross_total_income: f64,
    deductions: &DeductionSummary,
) -> f64 {
    if regime.is_itemized() {
        deductions.total_deductions()
    } else {
        rules
            .regime(regime)
            .standard_deduction
            .min(gross_total_income.max(0.0))
    }
}

/// Tax for the chosen regime. Under the itemised regime the flat regime is
/// also computed, with no itemised deductions, for comparison only.
pub fn compute(
    rules: &TaxRules,
    aggregated: &AggregatedIncome,
    deductions: &DeductionSummary,
    regime: TaxRegime,
) -> TaxComputationResult {
    let gti = aggregated.gross_total_income();
    let tds = aggregated.total_tds();
    let applied = applied_deductions(rules, regime, gti, deductions);
    let mut result = compute_for_regime(rules.regime(regime), regime, gti, applied, tds);

    if regime.is_itemized() {
        let alternate = regime.alternate();
        let flat_deductions = rules.regime(alternate).standard_deduction.min(gti.max(0.0));
        let other = compute_for_regime(rules.regime(alternate), alternate, gti, flat_deductions, tds);
        let recommendation = if other.total_tax_liability < result.total_tax_liability {
            format!("Consider {} regime", alternate.as_str().to_lowercase())
        } else {
            format!("{} regime is better", capitalize(regime.as_str()))
        };
        result.comparison = Some(RegimeComparison {
            regime: alternate,
            taxable_income: other.taxable_income,
            total_tax: other.total_tax_liability,
            net_refund: other.net_refund,
            net_payable: other.net_payable,
            recommendation,
        });
    }

    result
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Computation stage. Optimisation advice goes into the step details only.
pub fn run_computation(
    oracle: &dyn InferenceOracle,
    rules: &TaxRules,
    aggregated: &AggregatedIncome,
    deductions: &DeductionSummary,
    taxpayer: &TaxpayerProfile,
) -> (TaxComputationResult, StepRecord) {
    let mut step = StepTracker::begin(
        Stage::TaxComputation,
        format!(
            "GTI {:.2}, deductions {:.2}, {} regime",
            aggregated.gross_total_income(),
            deductions.total_deductions(),
            taxpayer.regime
        ),
    );
    let result = compute(rules, aggregated, deductions, taxpayer.regime);

    let advice = if oracle.is_live() {
        infer_record::<OptimizationRecord>(oracle, &build_optimization_prompt(taxpayer, &result))
            .map_err(|e| {
                tracing::warn!(stage = "TAX_COMPUTATION", error = %e, "Optimisation advice unavailable");
            })
            .ok()
            .filter(|a| !a.optimization_strategies.is_empty())
    } else {
        None
    };
    step.path(advice.is_some());
    let (strategies, saving) = match advice {
        Some(a) => (a.optimization_strategies, a.potential_annual_saving),
        None => (FALLBACK_STRATEGIES.iter().map(|s| s.to_string()).collect(), 0.0),
    };

    step.detail("taxable_income", result.taxable_income);
    step.detail("total_tax", result.total_tax_liability);
    step.detail("net_refund", result.net_refund);
    step.detail("net_payable", result.net_payable);
    step.detail("optimization_strategies", &strategies);
    step.detail("potential_annual_saving", saving);
    if let Some(comparison) = &result.comparison {
        step.detail("comparison", comparison);
    }

    let summary = format!(
        "{}; total tax {:.2}; {} strategies",
        result.outcome_label(),
        result.total_tax_liability,
        strategies.len()
    );
    (result, step.finish(summary))
}
