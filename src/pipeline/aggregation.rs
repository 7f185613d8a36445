use crate::models::{AggregatedIncome, RawIncomeFields, Stage, StepRecord};
use crate::pipeline::oracle::{infer_record, AggregationReviewRecord, InferenceOracle};
use crate::pipeline::prompt::build_aggregation_review_prompt;
use crate::pipeline::steps::StepTracker;

/// Sum the income sources. Each TDS figure is clamped to its own source first.
pub fn aggregate(raw: &RawIncomeFields) -> AggregatedIncome {
    AggregatedIncome::from_sources(raw)
}

/// Notes for TDS figures the aggregation had to clamp.
pub fn anomaly_notes(raw: &RawIncomeFields) -> Vec<String> {
    let mut notes = Vec::new();
    if raw.tds_salary > raw.gross_salary {
        notes.push(format!(
            "salary TDS {:.2} exceeds salary {:.2}; clamped",
            raw.tds_salary, raw.gross_salary
        ));
    }
    if raw.tds_bank > raw.interest_income {
        notes.push(format!(
            "bank TDS {:.2} exceeds interest {:.2}; clamped",
            raw.tds_bank, raw.interest_income
        ));
    }
    if raw.tds_salary < 0.0 || raw.tds_bank < 0.0 {
        notes.push("negative TDS treated as 0".to_string());
    }
    notes
}

/// Aggregation stage. The oracle review only annotates the step; the
/// figures always come from [`aggregate`].
pub fn run_aggregation(
    oracle: &dyn InferenceOracle,
    raw: &RawIncomeFields,
) -> (AggregatedIncome, StepRecord) {
    let mut step = StepTracker::begin(
        Stage::IncomeAggregator,
        format!(
            "salary {:.2}, interest {:.2}, other {:.2}",
            raw.gross_salary, raw.interest_income, raw.other_income
        ),
    );
    let aggregated = aggregate(raw);

    step.detail("anomalies", anomaly_notes(raw));
    let review = if oracle.is_live() {
        let prompt = build_aggregation_review_prompt(raw, &aggregated);
        infer_record::<AggregationReviewRecord>(oracle, &prompt)
            .map_err(|e| {
                tracing::warn!(stage = "INCOME_AGGREGATOR", error = %e, "Aggregation review unavailable");
            })
            .ok()
    } else {
        None
    };
    step.path(review.is_some());
    if let Some(review) = review {
        step.detail("oracle_review_ok", review.is_aggregated_correctly);
        step.detail("oracle_anomalies", review.anomalies);
        step.detail("oracle_reasoning", review.reasoning);
    }

    step.detail("gross_total_income", aggregated.gross_total_income());
    step.detail("total_tds", aggregated.total_tds());
    let summary = format!(
        "GTI {:.2}, TDS {:.2}",
        aggregated.gross_total_income(),
        aggregated.total_tds()
    );
    (aggregated, step.finish(summary))
}
