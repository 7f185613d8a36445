use serde::Deserialize;

use crate::models::{DeductionSummary, TaxComputationResult, TaxTip, TaxpayerProfile};
use crate::pipeline::oracle::{de_amount, infer_record, parse_array_lenient, InferenceOracle, TipsRecord};
use crate::pipeline::prompt::build_tips_prompt;
use crate::rules::TaxRules;

/// Rough marginal rate used to turn unused 80C headroom into a saving.
const HEADROOM_SAVING_RATE: f64 = 0.20;
const HEALTH_COVER_SAVING: f64 = 5_000.0;
const NPS_SAVING: f64 = 15_000.0;

#[derive(Debug, Deserialize)]
struct TipItem {
    category: String,
    message: String,
    #[serde(default, deserialize_with = "de_amount")]
    potential_saving: f64,
}

/// Fixed tips for the itemised regime; none for the flat one.
pub fn fallback_tips(
    rules: &TaxRules,
    taxpayer: &TaxpayerProfile,
    deductions: &DeductionSummary,
    result: &TaxComputationResult,
) -> Vec<TaxTip> {
    if !taxpayer.regime.is_itemized() {
        return Vec::new();
    }
    let mut tips = Vec::new();

    let cap_80c = rules.deductions.section_80c;
    let headroom = cap_80c - deductions.section_80c();
    if headroom > 0.0 {
        let saving = headroom * HEADROOM_SAVING_RATE;
        tips.push(TaxTip {
            category: "80C Investment".into(),
            message: format!(
                "You have ₹{headroom:.0} of unused 80C limit. PPF, ELSS or NSC could save about ₹{saving:.0}."
            ),
            potential_saving: saving,
        });
    }

    if deductions.section_80d() == 0.0 {
        tips.push(TaxTip {
            category: "Health Insurance".into(),
            message: format!(
                "Health insurance premiums are deductible under 80D up to ₹{:.0}.",
                rules.section_80d_cap(taxpayer.age)
            ),
            potential_saving: HEALTH_COVER_SAVING,
        });
    }

    tips.push(TaxTip {
        category: "NPS (80CCD1B)".into(),
        message: "An extra NPS contribution of up to ₹50,000 is deductible over the 80C limit.".into(),
        potential_saving: NPS_SAVING,
    });

    if let Some(comparison) = &result.comparison {
        if comparison.total_tax < result.total_tax_liability {
            let diff = result.total_tax_liability - comparison.total_tax;
            tips.push(TaxTip {
                category: "Regime Switch".into(),
                message: format!(
                    "The {} regime would cost ₹{diff:.0} less tax for the same income.",
                    comparison.regime.as_str().to_lowercase()
                ),
                potential_saving: diff,
            });
        }
    }

    tips
}

/// Oracle tips when any item parses; the fixed set otherwise.
/// Returns the tips and whether the oracle produced them.
pub fn generate_tips(
    oracle: &dyn InferenceOracle,
    rules: &TaxRules,
    taxpayer: &TaxpayerProfile,
    deductions: &DeductionSummary,
    result: &TaxComputationResult,
) -> (Vec<TaxTip>, bool) {
    if oracle.is_live() {
        match infer_record::<TipsRecord>(oracle, &build_tips_prompt(taxpayer, deductions, result)) {
            Ok(record) => {
                let tips: Vec<TaxTip> = parse_array_lenient::<TipItem>(&record.tips)
                    .into_iter()
                    .map(|t| TaxTip {
                        category: t.category,
                        message: t.message,
                        potential_saving: t.potential_saving.max(0.0),
                    })
                    .collect();
                if !tips.is_empty() {
                    return (tips, true);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tax tips fell back to fixed set");
            }
        }
    }
    (fallback_tips(rules, taxpayer, deductions, result), false)
}
