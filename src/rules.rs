//! Statutory figures for one financial year.
//!
//! Slab tables, rebate thresholds, cess and deduction caps are data, not code:
//! the built-in set covers FY 2024-25 and a JSON file with the same shape can
//! replace it (`ITR_RULES_PATH`). Loaded rule-sets are checked for contiguous,
//! ascending slabs before use.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TaxRegime;

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Cannot read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed rules file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid rules for {regime}: {reason}")]
    Invalid { regime: String, reason: String },
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// One marginal band: income above `lower` and up to `upper` is taxed at `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slab {
    pub lower: f64,
    pub upper: Option<f64>,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rebate {
    /// Rebate applies when taxable income is at or below this.
    pub max_income: f64,
    pub max_rebate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeRules {
    pub slabs: Vec<Slab>,
    pub standard_deduction: f64,
    pub rebate: Rebate,
    pub cess_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionLimits {
    pub section_80c: f64,
    pub section_80d_self: f64,
    pub section_80d_senior: f64,
    pub senior_age: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRules {
    pub financial_year: String,
    pub old_regime: RegimeRules,
    pub new_regime: RegimeRules,
    pub deductions: DeductionLimits,
}

// ═══════════════════════════════════════════════════════════
// Construction
// ═══════════════════════════════════════════════════════════

impl TaxRules {
    /// FY 2024-25 (AY 2025-26).
    pub fn fy_2024_25() -> Self {
        Self {
            financial_year: "2024-25".into(),
            old_regime: RegimeRules {
                slabs: vec![
                    slab(0.0, Some(250_000.0), 0.0),
                    slab(250_000.0, Some(500_000.0), 0.05),
                    slab(500_000.0, Some(1_000_000.0), 0.20),
                    slab(1_000_000.0, None, 0.30),
                ],
                standard_deduction: 50_000.0,
                rebate: Rebate {
                    max_income: 500_000.0,
                    max_rebate: 12_500.0,
                },
                cess_rate: 0.04,
            },
            new_regime: RegimeRules {
                slabs: vec![
                    slab(0.0, Some(300_000.0), 0.0),
                    slab(300_000.0, Some(700_000.0), 0.05),
                    slab(700_000.0, Some(1_000_000.0), 0.10),
                    slab(1_000_000.0, Some(1_200_000.0), 0.15),
                    slab(1_200_000.0, Some(1_500_000.0), 0.20),
                    slab(1_500_000.0, None, 0.30),
                ],
                standard_deduction: 75_000.0,
                rebate: Rebate {
                    max_income: 700_000.0,
                    max_rebate: 25_000.0,
                },
                cess_rate: 0.04,
            },
            deductions: DeductionLimits {
                section_80c: 150_000.0,
                section_80d_self: 25_000.0,
                section_80d_senior: 50_000.0,
                senior_age: 60,
            },
        }
    }

    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        let rules: TaxRules = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn from_file(path: &Path) -> Result<Self, RulesError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load the override file when given, otherwise the built-in year.
    pub fn load(path: Option<&Path>) -> Result<Self, RulesError> {
        match path {
            Some(p) => {
                let rules = Self::from_file(p)?;
                tracing::info!(path = %p.display(), fy = %rules.financial_year, "Loaded tax rules override");
                Ok(rules)
            }
            None => Ok(Self::fy_2024_25()),
        }
    }

    pub fn regime(&self, regime: TaxRegime) -> &RegimeRules {
        match regime {
            TaxRegime::Old => &self.old_regime,
            TaxRegime::New => &self.new_regime,
        }
    }

    pub fn section_80d_cap(&self, age: u32) -> f64 {
        if age >= self.deductions.senior_age {
            self.deductions.section_80d_senior
        } else {
            self.deductions.section_80d_self
        }
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        for regime in TaxRegime::all() {
            validate_regime(*regime, self.regime(*regime))?;
        }
        let d = &self.deductions;
        if d.section_80c < 0.0 || d.section_80d_self < 0.0 || d.section_80d_senior < 0.0 {
            return Err(RulesError::Invalid {
                regime: "deductions".into(),
                reason: "deduction caps must be non-negative".into(),
            });
        }
        Ok(())
    }
}

impl Default for TaxRules {
    fn default() -> Self {
        Self::fy_2024_25()
    }
}

fn slab(lower: f64, upper: Option<f64>, rate: f64) -> Slab {
    Slab { lower, upper, rate }
}

fn validate_regime(regime: TaxRegime, rules: &RegimeRules) -> Result<(), RulesError> {
    let invalid = |reason: String| RulesError::Invalid {
        regime: regime.as_str().into(),
        reason,
    };

    let first = rules
        .slabs
        .first()
        .ok_or_else(|| invalid("no slabs".into()))?;
    if first.lower != 0.0 {
        return Err(invalid(format!("first slab starts at {}", first.lower)));
    }

    for (i, s) in rules.slabs.iter().enumerate() {
        if !(0.0..=1.0).contains(&s.rate) {
            return Err(invalid(format!("slab {i} rate {} outside [0, 1]", s.rate)));
        }
        let is_last = i + 1 == rules.slabs.len();
        match (s.upper, is_last) {
            (None, true) => {}
            (None, false) => return Err(invalid(format!("slab {i} unbounded but not last"))),
            (Some(_), true) => return Err(invalid("last slab must be unbounded".into())),
            (Some(upper), false) => {
                if upper <= s.lower {
                    return Err(invalid(format!("slab {i} upper {upper} <= lower {}", s.lower)));
                }
                let next = rules.slabs[i + 1].lower;
                if next != upper {
                    return Err(invalid(format!("gap between {upper} and {next}")));
                }
            }
        }
    }

    if !(0.0..=1.0).contains(&rules.cess_rate) {
        return Err(invalid(format!("cess rate {} outside [0, 1]", rules.cess_rate)));
    }
    if rules.standard_deduction < 0.0 || rules.rebate.max_rebate < 0.0 {
        return Err(invalid("negative standard deduction or rebate".into()));
    }
    Ok(())
}
