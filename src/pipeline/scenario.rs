use crate::models::{
    AggregatedIncome, RiskLevel, ScenarioAssessment, ScenarioType, Stage, StepRecord,
    TaxpayerProfile,
};
use crate::pipeline::oracle::{infer_record, InferenceOracle, ScenarioRecord};
use crate::pipeline::prompt::build_scenario_prompt;
use crate::pipeline::steps::StepTracker;
use crate::rules::TaxRules;

/// Gross total income above which a filer counts as a high earner.
pub const HIGH_EARNER_THRESHOLD: f64 = 5_000_000.0;

/// Deterministic bucket by age and income.
pub fn classify_scenario(
    rules: &TaxRules,
    taxpayer: &TaxpayerProfile,
    aggregated: &AggregatedIncome,
) -> ScenarioAssessment {
    let (scenario, reasoning) = if taxpayer.is_senior(rules.deductions.senior_age) {
        (ScenarioType::SeniorCitizen, format!("age {} qualifies as senior", taxpayer.age))
    } else if aggregated.gross_total_income() > HIGH_EARNER_THRESHOLD {
        (
            ScenarioType::HighEarner,
            format!("gross total income {:.0} above {HIGH_EARNER_THRESHOLD:.0}", aggregated.gross_total_income()),
        )
    } else {
        (ScenarioType::SalariedBasic, "salary and interest income only".to_string())
    };

    ScenarioAssessment {
        scenario,
        risk: RiskLevel::Low,
        reasoning,
    }
}

/// Scenario routing. Advisory only: nothing downstream branches on it.
pub fn run_scenario(
    oracle: &dyn InferenceOracle,
    rules: &TaxRules,
    taxpayer: &TaxpayerProfile,
    aggregated: &AggregatedIncome,
) -> (ScenarioAssessment, StepRecord) {
    let mut step = StepTracker::begin(
        Stage::ScenarioRouter,
        format!("age {}, GTI {:.2}", taxpayer.age, aggregated.gross_total_income()),
    );

    let from_oracle = if oracle.is_live() {
        infer_record::<ScenarioRecord>(oracle, &build_scenario_prompt(taxpayer, aggregated))
            .map_err(|e| {
                tracing::warn!(stage = "SCENARIO_ROUTER", error = %e, "Scenario routing fell back");
            })
            .ok()
            .map(|r| ScenarioAssessment {
                scenario: ScenarioType::from_label(&r.scenario_type),
                risk: RiskLevel::from_label(&r.risk_level),
                reasoning: r.reasoning,
            })
    } else {
        None
    };
    step.path(from_oracle.is_some());
    let assessment = from_oracle.unwrap_or_else(|| classify_scenario(rules, taxpayer, aggregated));

    step.detail("scenario", assessment.scenario);
    step.detail("risk", assessment.risk);
    let summary = format!("{} ({} risk)", assessment.scenario, assessment.risk);
    (assessment, step.finish(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawIncomeFields;
    use crate::pipeline::oracle::{HeuristicOracle, MockOracle};

    fn income(salary: f64) -> AggregatedIncome {
        AggregatedIncome::from_sources(&RawIncomeFields {
            gross_salary: salary,
            ..Default::default()
        })
    }

    #[test]
    fn fallback_buckets() {
        let rules = TaxRules::default();
        let mut taxpayer = TaxpayerProfile::default();
        assert_eq!(
            classify_scenario(&rules, &taxpayer, &income(900_000.0)).scenario,
            ScenarioType::SalariedBasic
        );
        assert_eq!(
            classify_scenario(&rules, &taxpayer, &income(6_000_000.0)).scenario,
            ScenarioType::HighEarner
        );
        taxpayer.age = 60;
        let senior = classify_scenario(&rules, &taxpayer, &income(6_000_000.0));
        assert_eq!(senior.scenario, ScenarioType::SeniorCitizen);
        assert_eq!(senior.risk, RiskLevel::Low);
    }

    #[test]
    fn unknown_oracle_label_maps_to_basic() {
        let oracle = MockOracle::new().with_value(
            "tax_scenario",
            serde_json::json!({"scenario_type": "crypto trader", "risk_level": "high", "reasoning": "?"}),
        );
        let (assessment, step) =
            run_scenario(&oracle, &TaxRules::default(), &TaxpayerProfile::default(), &income(900_000.0));
        assert_eq!(assessment.scenario, ScenarioType::SalariedBasic);
        assert_eq!(assessment.risk, RiskLevel::High);
        assert_eq!(step.details["path"], "oracle");
    }

    #[test]
    fn no_oracle_uses_buckets() {
        let (assessment, step) = run_scenario(
            &HeuristicOracle,
            &TaxRules::default(),
            &TaxpayerProfile::default(),
            &income(900_000.0),
        );
        assert_eq!(assessment.scenario, ScenarioType::SalariedBasic);
        assert_eq!(step.details["scenario"], "SALARIED_BASIC");
    }
}
