//! E-verification: the last stage, and the only one that can fail a run.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use regex::Regex;

use crate::models::{FilingStatus, Stage, StepRecord, TaxComputationResult, TaxpayerProfile};
use crate::pipeline::oracle::{infer_record, InferenceOracle, VerificationRecord};
use crate::pipeline::prompt::build_verification_prompt;
use crate::pipeline::steps::StepTracker;

static PAN_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Verified {
        ack_number: String,
        verified_at: DateTime<Utc>,
    },
    /// The computation was not confirmed; a person has to look at it.
    NeedsReview(String),
    /// Identity data is malformed. Terminal.
    Rejected(String),
}

impl VerificationOutcome {
    pub fn into_status(self) -> (FilingStatus, Option<String>) {
        let now = Utc::now();
        match self {
            Self::Verified {
                ack_number,
                verified_at,
            } => (
                FilingStatus::EVerified {
                    ack_number,
                    verified_at,
                },
                None,
            ),
            Self::NeedsReview(reason) => (FilingStatus::NeedsReview { since: now }, Some(reason)),
            Self::Rejected(message) => (FilingStatus::Failed { message, at: now }, None),
        }
    }
}

pub fn is_valid_pan(pan: &str) -> bool {
    PAN_FORMAT.is_match(&pan.trim().to_uppercase())
}

/// `ITR{year}{age:02}` followed by eight random digits.
pub fn acknowledgement_number(year: i32, age: u32) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(10_000_000..=99_999_999);
    format!("ITR{year}{age:02}{suffix}")
}

pub fn run_everification(
    oracle: &dyn InferenceOracle,
    taxpayer: &TaxpayerProfile,
    result: &TaxComputationResult,
) -> (VerificationOutcome, StepRecord) {
    let pan = taxpayer.pan.trim().to_uppercase();
    let mut step = StepTracker::begin(
        Stage::EVerification,
        format!("PAN {pan}, liability {:.2}", result.total_tax_liability),
    );

    if !is_valid_pan(&pan) {
        let message = format!("Invalid PAN format '{pan}', expected e.g. ABCDE1234F");
        step.detail("pan_valid", false);
        return (VerificationOutcome::Rejected(message.clone()), step.fail(message));
    }
    step.detail("pan_valid", true);

    let opinion = if oracle.is_live() {
        infer_record::<VerificationRecord>(oracle, &build_verification_prompt(taxpayer, result))
            .map_err(|e| {
                tracing::warn!(stage = "E_VERIFICATION", error = %e, "Computation check fell back");
            })
            .ok()
    } else {
        None
    };
    step.path(opinion.is_some());
    let (verified, reasoning) = match opinion {
        Some(o) => (o.computation_verified, o.reasoning),
        None => (
            result.taxable_income >= 0.0 && result.total_tax_liability >= 0.0,
            "taxable income and liability are non-negative".to_string(),
        ),
    };
    step.detail("computation_verified", verified);
    step.detail("reasoning", &reasoning);

    if !verified {
        let reason = if reasoning.is_empty() {
            "computation not verified".to_string()
        } else {
            format!("computation not verified: {reasoning}")
        };
        return (
            VerificationOutcome::NeedsReview(reason.clone()),
            step.finish(format!("held for review: {reason}")),
        );
    }

    let verified_at = Utc::now();
    let ack_number = acknowledgement_number(verified_at.year(), taxpayer.age);
    step.detail("ack_number", &ack_number);
    step.detail("verified_at", verified_at);
    tracing::info!(ack = %ack_number, "Return e-verified");
    let summary = format!("e-verified, acknowledgement {ack_number}");
    (
        VerificationOutcome::Verified {
            ack_number,
            verified_at,
        },
        step.finish(summary),
    )
}
