use crate::models::{
    AggregatedIncome, DeductionComponents, DeductionSummary, RawDeductionFields, Stage,
    StepRecord, TaxRegime, TaxpayerProfile,
};
use crate::pipeline::oracle::{infer_record, DeductionNarrativeRecord, InferenceOracle};
use crate::pipeline::prompt::build_deduction_prompt;
use crate::pipeline::steps::StepTracker;
use crate::rules::TaxRules;

/// Apply regime rules and statutory caps, then fit the total under gross
/// total income.
pub fn cap_components(
    rules: &TaxRules,
    raw: &RawDeductionFields,
    gross_total_income: f64,
    regime: TaxRegime,
    age: u32,
) -> DeductionComponents {
    let standard = rules.regime(regime).standard_deduction;
    let mut components = if regime.is_itemized() {
        DeductionComponents {
            standard,
            section_80c: raw.section_80c.clamp(0.0, rules.deductions.section_80c),
            section_80d: raw.section_80d.clamp(0.0, rules.section_80d_cap(age)),
            hra_exemption: raw.hra_exemption.max(0.0),
            other: raw.other.max(0.0),
        }
    } else {
        DeductionComponents {
            standard,
            ..Default::default()
        }
    };

    reallocate(&mut components, gross_total_income.max(0.0));
    components
}

/// Remove any excess over `limit`: other first, then exemption, 80D, 80C,
/// and the standard deduction last.
pub fn reallocate(components: &mut DeductionComponents, limit: f64) {
    let mut excess = components.total() - limit;
    for slot in [
        &mut components.other,
        &mut components.hra_exemption,
        &mut components.section_80d,
        &mut components.section_80c,
        &mut components.standard,
    ] {
        if excess <= 0.0 {
            break;
        }
        let cut = slot.min(excess);
        *slot -= cut;
        excess -= cut;
    }
}

/// Deterministic explanation: which limits applied and the headroom left.
pub fn template_explanation(
    rules: &TaxRules,
    raw: &RawDeductionFields,
    components: &DeductionComponents,
    regime: TaxRegime,
    age: u32,
) -> Vec<String> {
    let mut lines = vec![format!(
        "- Standard deduction of {:.0} under the {regime} regime",
        components.standard
    )];
    if !regime.is_itemized() {
        lines.push("- Itemised deductions (80C, 80D, HRA) do not apply under this regime".into());
        return lines;
    }

    let cap_80c = rules.deductions.section_80c;
    if raw.section_80c > cap_80c {
        lines.push(format!("- Section 80C claim of {:.0} capped at {cap_80c:.0}", raw.section_80c));
    } else {
        lines.push(format!(
            "- Section 80C: {:.0} claimed, {:.0} headroom left",
            components.section_80c,
            cap_80c - components.section_80c
        ));
    }

    let cap_80d = rules.section_80d_cap(age);
    if raw.section_80d > cap_80d {
        lines.push(format!("- Section 80D claim of {:.0} capped at {cap_80d:.0}", raw.section_80d));
    } else if components.section_80d > 0.0 {
        lines.push(format!("- Section 80D: {:.0} claimed", components.section_80d));
    }
    if components.hra_exemption > 0.0 {
        lines.push(format!("- HRA exemption of {:.0}", components.hra_exemption));
    }
    if components.other > 0.0 {
        lines.push(format!("- Other deductions of {:.0}", components.other));
    }

    let claimed = raw.section_80c.clamp(0.0, cap_80c)
        + raw.section_80d.clamp(0.0, cap_80d)
        + raw.hra_exemption.max(0.0)
        + raw.other.max(0.0)
        + components.standard;
    if claimed > components.total() {
        lines.push(format!(
            "- Total reduced by {:.0} to stay within gross total income",
            claimed - components.total()
        ));
    }
    lines
}

/// Capped deductions with the template explanation.
pub fn claim(
    rules: &TaxRules,
    raw: &RawDeductionFields,
    aggregated: &AggregatedIncome,
    regime: TaxRegime,
    age: u32,
) -> DeductionSummary {
    let components = cap_components(rules, raw, aggregated.gross_total_income(), regime, age);
    let explanation = template_explanation(rules, raw, &components, regime, age);
    DeductionSummary::new(components, explanation)
}

/// Deduction stage. The oracle may only replace the explanation text.
pub fn run_deductions(
    oracle: &dyn InferenceOracle,
    rules: &TaxRules,
    raw: &RawDeductionFields,
    aggregated: &AggregatedIncome,
    taxpayer: &TaxpayerProfile,
) -> (DeductionSummary, StepRecord) {
    let regime = taxpayer.regime;
    let mut step = StepTracker::begin(
        Stage::DeductionClaimer,
        format!(
            "{regime} regime, 80C {:.2}, 80D {:.2}, HRA {:.2}, other {:.2}",
            raw.section_80c, raw.section_80d, raw.hra_exemption, raw.other
        ),
    );
    let summary = claim(rules, raw, aggregated, regime, taxpayer.age);

    let narrative = if oracle.is_live() {
        infer_record::<DeductionNarrativeRecord>(oracle, &build_deduction_prompt(&summary, regime))
            .map_err(|e| {
                tracing::warn!(stage = "DEDUCTION_CLAIMER", error = %e, "Deduction narrative unavailable");
            })
            .ok()
            .filter(|n| !n.bullets.is_empty())
    } else {
        None
    };
    step.path(narrative.is_some());
    let summary = match narrative {
        Some(n) => DeductionSummary::new(*summary.components(), n.bullets),
        None => summary,
    };

    step.detail("components", summary.components());
    step.detail("total_deductions", summary.total_deductions());
    let output = format!("total deductions {:.2}", summary.total_deductions());
    (summary, step.finish(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::oracle::{HeuristicOracle, MockOracle};

    fn aggregated(salary: f64, interest: f64) -> AggregatedIncome {
        AggregatedIncome::from_sources(&crate::models::RawIncomeFields {
            gross_salary: salary,
            interest_income: interest,
            ..Default::default()
        })
    }

    #[test]
    fn old_regime_scenario() {
        let rules = TaxRules::default();
        let raw = RawDeductionFields {
            section_80c: 150_000.0,
            section_80d: 25_000.0,
            hra_exemption: 300_000.0,
            other: 0.0,
        };
        let summary = claim(&rules, &raw, &aggregated(1_500_000.0, 50_000.0), TaxRegime::Old, 35);
        assert_eq!(summary.standard_deduction(), 50_000.0);
        assert_eq!(summary.section_80c(), 150_000.0);
        assert_eq!(summary.section_80d(), 25_000.0);
        assert_eq!(summary.hra_exemption(), 300_000.0);
        assert_eq!(summary.total_deductions(), 525_000.0);
    }

    #[test]
    fn caps_depend_on_age() {
        let rules = TaxRules::default();
        let raw = RawDeductionFields {
            section_80c: 400_000.0,
            section_80d: 80_000.0,
            ..Default::default()
        };
        let young = cap_components(&rules, &raw, 2_000_000.0, TaxRegime::Old, 40);
        let senior = cap_components(&rules, &raw, 2_000_000.0, TaxRegime::Old, 60);
        assert_eq!(young.section_80c, 150_000.0);
        assert_eq!(young.section_80d, 25_000.0);
        assert_eq!(senior.section_80d, 50_000.0);
    }

    #[test]
    fn new_regime_ignores_itemised_claims() {
        let rules = TaxRules::default();
        let raw = RawDeductionFields {
            section_80c: 150_000.0,
            section_80d: 25_000.0,
            hra_exemption: 100_000.0,
            other: 10_000.0,
        };
        let c = cap_components(&rules, &raw, 1_000_000.0, TaxRegime::New, 30);
        assert_eq!(c.standard, 75_000.0);
        assert_eq!(c.total(), 75_000.0);
    }

    #[test]
    fn excess_removed_other_first() {
        let rules = TaxRules::default();
        let raw = RawDeductionFields {
            section_80c: 150_000.0,
            section_80d: 25_000.0,
            hra_exemption: 100_000.0,
            other: 50_000.0,
        };
        // 375,000 claimed against 340,000 of income
        let c = cap_components(&rules, &raw, 340_000.0, TaxRegime::Old, 30);
        assert_eq!(c.other, 15_000.0);
        assert_eq!(c.hra_exemption, 100_000.0);
        assert_eq!(c.total(), 340_000.0);
    }

    #[test]
    fn excess_reaches_standard_last() {
        let rules = TaxRules::default();
        let raw = RawDeductionFields {
            section_80c: 150_000.0,
            section_80d: 25_000.0,
            hra_exemption: 100_000.0,
            other: 50_000.0,
        };
        let c = cap_components(&rules, &raw, 30_000.0, TaxRegime::Old, 30);
        assert_eq!(c.other, 0.0);
        assert_eq!(c.hra_exemption, 0.0);
        assert_eq!(c.section_80d, 0.0);
        assert_eq!(c.section_80c, 0.0);
        assert_eq!(c.standard, 30_000.0);
    }

    #[test]
    fn zero_income_zeroes_flat_standard() {
        let rules = TaxRules::default();
        let c = cap_components(&rules, &RawDeductionFields::default(), 0.0, TaxRegime::New, 30);
        assert_eq!(c.total(), 0.0);
    }

    #[test]
    fn total_never_exceeds_income() {
        let rules = TaxRules::default();
        let raw = RawDeductionFields {
            section_80c: 90_000.0,
            section_80d: 60_000.0,
            hra_exemption: 250_000.0,
            other: 40_000.0,
        };
        for gti in [0.0, 1.0, 49_999.0, 120_000.0, 333_333.0, 10_000_000.0] {
            for regime in [TaxRegime::Old, TaxRegime::New] {
                let c = cap_components(&rules, &raw, gti, regime, 45);
                assert!(c.total() <= gti + 1e-9, "gti {gti} regime {regime}");
                assert!(c.standard >= 0.0 && c.other >= 0.0);
            }
        }
    }

    #[test]
    fn negative_claims_floor_at_zero() {
        let rules = TaxRules::default();
        let raw = RawDeductionFields {
            section_80c: -5_000.0,
            other: -1.0,
            ..Default::default()
        };
        let c = cap_components(&rules, &raw, 500_000.0, TaxRegime::Old, 30);
        assert_eq!(c.section_80c, 0.0);
        assert_eq!(c.other, 0.0);
    }

    #[test]
    fn oracle_bullets_replace_template_only() {
        let rules = TaxRules::default();
        let taxpayer = TaxpayerProfile::default();
        let raw = RawDeductionFields {
            section_80c: 200_000.0,
            ..Default::default()
        };
        let income = aggregated(900_000.0, 0.0);
        let oracle = MockOracle::new().with_value(
            "deduction_explanation",
            serde_json::json!({"bullets": ["- 80C is capped at 1.5 lakh"]}),
        );

        let (with_oracle, step) = run_deductions(&oracle, &rules, &raw, &income, &taxpayer);
        let (fallback, _) = run_deductions(&HeuristicOracle, &rules, &raw, &income, &taxpayer);

        assert_eq!(with_oracle.components(), fallback.components());
        assert_eq!(with_oracle.explanation, vec!["- 80C is capped at 1.5 lakh".to_string()]);
        assert!(fallback.explanation.iter().any(|l| l.contains("capped at 150000")));
        assert_eq!(step.details["path"], "oracle");
    }
}
