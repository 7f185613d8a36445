use serde::{Deserialize, Serialize};

/// ITR-1 (Sahaj) as filled from the computed figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItrForm {
    pub itr_type: String,
    pub part_a: PartA,
    pub schedule_salary: ScheduleSalary,
    pub schedule_other_sources: ScheduleOtherSources,
    pub schedule_via: ScheduleVia,
    pub tax_computation: FormTaxComputation,
}

/// General information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartA {
    pub name: String,
    pub pan: String,
    pub age: u32,
    pub financial_year: String,
    pub assessment_year: String,
    pub residential_status: String,
    pub employer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSalary {
    pub gross_salary: f64,
    pub standard_deduction_u16: f64,
    pub exempt_allowances: f64,
    pub net_salary: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOtherSources {
    pub interest_income: f64,
    pub other_income: f64,
    pub total: f64,
}

/// Chapter VI-A deductions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleVia {
    pub sec_80c: f64,
    pub sec_80d: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTaxComputation {
    pub gross_total_income: f64,
    pub total_deductions: f64,
    pub taxable_income: f64,
    pub tax_on_income: f64,
    pub rebate_87a: f64,
    pub surcharge: f64,
    pub health_education_cess: f64,
    pub total_tax: f64,
    pub tds: f64,
    pub net_refund: f64,
    pub net_payable: f64,
}

impl ItrForm {
    /// All monetary values, labelled, for range checks.
    pub fn amounts(&self) -> Vec<(&'static str, f64)> {
        let tc = &self.tax_computation;
        vec![
            ("gross_salary", self.schedule_salary.gross_salary),
            ("standard_deduction_u16", self.schedule_salary.standard_deduction_u16),
            ("net_salary", self.schedule_salary.net_salary),
            ("interest_income", self.schedule_other_sources.interest_income),
            ("other_sources_total", self.schedule_other_sources.total),
            ("sec_80c", self.schedule_via.sec_80c),
            ("sec_80d", self.schedule_via.sec_80d),
            ("via_total", self.schedule_via.total),
            ("gross_total_income", tc.gross_total_income),
            ("total_deductions", tc.total_deductions),
            ("taxable_income", tc.taxable_income),
            ("tax_on_income", tc.tax_on_income),
            ("rebate_87a", tc.rebate_87a),
            ("health_education_cess", tc.health_education_cess),
            ("total_tax", tc.total_tax),
            ("tds", tc.tds),
            ("net_refund", tc.net_refund),
            ("net_payable", tc.net_payable),
        ]
    }
}
