use serde::{Deserialize, Serialize};

use super::enums::{RiskLevel, ScenarioType, TaxRegime};

/// Tax attributed to one slab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabLine {
    pub band: String,
    pub lower: f64,
    pub upper: Option<f64>,
    pub rate: f64,
    pub income_in_band: f64,
    pub tax: f64,
}

/// The non-selected regime, computed for advice only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeComparison {
    pub regime: TaxRegime,
    pub taxable_income: f64,
    pub total_tax: f64,
    pub net_refund: f64,
    pub net_payable: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxComputationResult {
    pub regime: TaxRegime,
    pub gross_total_income: f64,
    pub total_deductions: f64,
    pub taxable_income: f64,
    pub tax_on_income: f64,
    pub rebate_87a: f64,
    pub cess: f64,
    pub total_tax_liability: f64,
    pub total_tds: f64,
    pub net_refund: f64,
    pub net_payable: f64,
    pub slab_breakdown: Vec<SlabLine>,
    pub comparison: Option<RegimeComparison>,
}

impl TaxComputationResult {
    pub fn outcome_label(&self) -> String {
        if self.net_refund > 0.0 {
            format!("Refund ₹{:.0}", self.net_refund)
        } else {
            format!("Tax payable ₹{:.0}", self.net_payable)
        }
    }
}

/// Advisory classification of the taxpayer's situation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAssessment {
    pub scenario: ScenarioType,
    pub risk: RiskLevel,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxTip {
    pub category: String,
    pub message: String,
    pub potential_saving: f64,
}
