use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Stage, StepRecord, StepStatus};

/// Builds one [`StepRecord`]: opened when a stage starts, closed exactly once.
#[derive(Debug)]
pub struct StepTracker {
    record: StepRecord,
}

impl StepTracker {
    pub fn begin(name: Stage, input_summary: impl Into<String>) -> Self {
        Self::begin_at(name, input_summary, Utc::now())
    }

    pub fn begin_at(name: Stage, input_summary: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        tracing::debug!(stage = name.as_str(), "Stage started");
        Self {
            record: StepRecord {
                step_id: Uuid::new_v4(),
                name,
                status: StepStatus::InProgress,
                started_at,
                completed_at: None,
                input_summary: input_summary.into(),
                output_summary: String::new(),
                details: serde_json::Map::new(),
                error: None,
            },
        }
    }

    /// Attach a detail. Values that fail to serialize are stored as null.
    pub fn detail(&mut self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.record.details.insert(key.to_string(), value);
    }

    /// Record which path a stage took: "oracle" or "fallback".
    pub fn path(&mut self, oracle_used: bool) {
        self.detail("path", if oracle_used { "oracle" } else { "fallback" });
    }

    pub fn finish(mut self, output_summary: impl Into<String>) -> StepRecord {
        self.record.status = StepStatus::Completed;
        self.record.output_summary = output_summary.into();
        self.record.completed_at = Some(Utc::now());
        self.record
    }

    pub fn fail(mut self, error: impl Into<String>) -> StepRecord {
        let error = error.into();
        tracing::info!(stage = self.record.name.as_str(), error = %error, "Stage failed");
        self.record.status = StepStatus::Failed;
        self.record.output_summary = error.clone();
        self.record.error = Some(error);
        self.record.completed_at = Some(Utc::now());
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_closes_step() {
        let mut tracker = StepTracker::begin(Stage::IncomeAggregator, "3 sources");
        tracker.detail("gross_total_income", 900_000.0);
        tracker.path(false);
        let step = tracker.finish("GTI 900000");

        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.input_summary, "3 sources");
        assert_eq!(step.details["gross_total_income"], 900_000.0);
        assert_eq!(step.details["path"], "fallback");
        assert!(step.completed_at.unwrap() >= step.started_at);
        assert!(step.error.is_none());
    }

    #[test]
    fn fail_records_error() {
        let step = StepTracker::begin(Stage::EVerification, "").fail("invalid PAN");
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error.as_deref(), Some("invalid PAN"));
    }
}
