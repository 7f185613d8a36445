use serde::{Deserialize, Serialize};

/// Income figures as read from documents or entered by hand.
/// Values may be temporarily invalid (negative) until the sanity gate runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawIncomeFields {
    pub gross_salary: f64,
    pub tds_salary: f64,
    pub interest_income: f64,
    pub tds_bank: f64,
    pub other_income: f64,
    pub employer_name: String,
}

impl RawIncomeFields {
    /// Componentwise maximum; the first non-empty employer name wins.
    pub fn merge_max(&mut self, other: &RawIncomeFields) {
        self.gross_salary = self.gross_salary.max(other.gross_salary);
        self.tds_salary = self.tds_salary.max(other.tds_salary);
        self.interest_income = self.interest_income.max(other.interest_income);
        self.tds_bank = self.tds_bank.max(other.tds_bank);
        self.other_income = self.other_income.max(other.other_income);
        if self.employer_name.is_empty() && !other.employer_name.is_empty() {
            self.employer_name = other.employer_name.clone();
        }
    }

    pub fn has_signal(&self) -> bool {
        [
            self.gross_salary,
            self.tds_salary,
            self.interest_income,
            self.tds_bank,
            self.other_income,
        ]
        .iter()
        .any(|v| *v != 0.0)
    }
}

/// Deduction claims before any cap is applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDeductionFields {
    pub section_80c: f64,
    pub section_80d: f64,
    pub hra_exemption: f64,
    pub other: f64,
}

impl RawDeductionFields {
    pub fn merge_max(&mut self, other: &RawDeductionFields) {
        self.section_80c = self.section_80c.max(other.section_80c);
        self.section_80d = self.section_80d.max(other.section_80d);
        self.hra_exemption = self.hra_exemption.max(other.hra_exemption);
        self.other = self.other.max(other.other);
    }

    pub fn has_signal(&self) -> bool {
        [self.section_80c, self.section_80d, self.hra_exemption, self.other]
            .iter()
            .any(|v| *v != 0.0)
    }
}

/// Summed income. Only constructed through [`AggregatedIncome::from_sources`],
/// so the gross total always equals salary + interest + other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedIncome {
    total_salary: f64,
    total_interest: f64,
    total_other: f64,
    gross_total_income: f64,
    tds_salary: f64,
    tds_bank: f64,
    total_tds: f64,
}

impl AggregatedIncome {
    /// Each TDS figure is clamped to [0, its source income] before summation.
    pub fn from_sources(raw: &RawIncomeFields) -> Self {
        let tds_salary = clamp_to_source(raw.tds_salary, raw.gross_salary);
        let tds_bank = clamp_to_source(raw.tds_bank, raw.interest_income);
        Self {
            total_salary: raw.gross_salary,
            total_interest: raw.interest_income,
            total_other: raw.other_income,
            gross_total_income: raw.gross_salary + raw.interest_income + raw.other_income,
            tds_salary,
            tds_bank,
            total_tds: tds_salary + tds_bank,
        }
    }

    pub fn total_salary(&self) -> f64 {
        self.total_salary
    }

    pub fn total_interest(&self) -> f64 {
        self.total_interest
    }

    pub fn total_other(&self) -> f64 {
        self.total_other
    }

    pub fn gross_total_income(&self) -> f64 {
        self.gross_total_income
    }

    pub fn tds_salary(&self) -> f64 {
        self.tds_salary
    }

    pub fn tds_bank(&self) -> f64 {
        self.tds_bank
    }

    pub fn total_tds(&self) -> f64 {
        self.total_tds
    }
}

fn clamp_to_source(tds: f64, income: f64) -> f64 {
    tds.min(income).max(0.0)
}

/// The five deduction heads after capping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeductionComponents {
    pub standard: f64,
    pub section_80c: f64,
    pub section_80d: f64,
    pub hra_exemption: f64,
    pub other: f64,
}

impl DeductionComponents {
    pub fn total(&self) -> f64 {
        self.standard + self.section_80c + self.section_80d + self.hra_exemption + self.other
    }
}

/// Claimed deductions. The total is derived from the components at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionSummary {
    #[serde(flatten)]
    components: DeductionComponents,
    total_deductions: f64,
    pub explanation: Vec<String>,
}

impl DeductionSummary {
    pub fn new(components: DeductionComponents, explanation: Vec<String>) -> Self {
        Self {
            total_deductions: components.total(),
            components,
            explanation,
        }
    }

    pub fn components(&self) -> &DeductionComponents {
        &self.components
    }

    pub fn standard_deduction(&self) -> f64 {
        self.components.standard
    }

    pub fn section_80c(&self) -> f64 {
        self.components.section_80c
    }

    pub fn section_80d(&self) -> f64 {
        self.components.section_80d
    }

    pub fn hra_exemption(&self) -> f64 {
        self.components.hra_exemption
    }

    pub fn other(&self) -> f64 {
        self.components.other
    }

    pub fn total_deductions(&self) -> f64 {
        self.total_deductions
    }
}
