//! Filing service: the pipeline plus a run store. Every pass is saved as soon
//! as it resolves.

use uuid::Uuid;

use crate::db::{RunStore, RunSummary};
use crate::models::{FilingInput, ManualInput, RawDeductionFields, RawIncomeFields, RunRecord};
use crate::pipeline::intake::parse_description;
use crate::pipeline::orchestrator::{FilingPipeline, PipelineError};

pub struct FilingService<S: RunStore> {
    pipeline: FilingPipeline,
    store: S,
}

impl<S: RunStore> FilingService<S> {
    pub fn new(pipeline: FilingPipeline, store: S) -> Self {
        Self { pipeline, store }
    }

    pub fn pipeline(&self) -> &FilingPipeline {
        &self.pipeline
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a new filing and save it, whatever state it ends in.
    pub fn file(&self, input: FilingInput) -> Result<RunRecord, PipelineError> {
        let run = self.pipeline.run(input);
        self.store.save(&run)?;
        Ok(run)
    }

    /// Resume a stored run held for review with corrected figures.
    pub fn resume(
        &self,
        run_id: Uuid,
        income: RawIncomeFields,
        deductions: RawDeductionFields,
    ) -> Result<RunRecord, PipelineError> {
        let run = self.show(run_id)?;
        let resumed = self.pipeline.resume(&run, income, deductions)?;
        self.store.save(&resumed)?;
        Ok(resumed)
    }

    pub fn show(&self, run_id: Uuid) -> Result<RunRecord, PipelineError> {
        self.store
            .load(&run_id)?
            .ok_or(PipelineError::RunNotFound(run_id))
    }

    /// Stored runs, newest first.
    pub fn history(&self) -> Result<Vec<RunSummary>, PipelineError> {
        Ok(self.store.list()?)
    }

    /// Turn a free-form description into manual input, without filing it.
    pub fn describe(&self, text: &str) -> ManualInput {
        parse_description(self.pipeline.oracle(), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::PipelineSettings;
    use crate::db::SqliteRunStore;
    use crate::models::{FilingState, RawDocument, TaxpayerProfile};
    use crate::pipeline::oracle::HeuristicOracle;
    use crate::rules::TaxRules;

    fn service() -> FilingService<SqliteRunStore> {
        let pipeline = FilingPipeline::new(
            Arc::new(HeuristicOracle),
            TaxRules::default(),
            PipelineSettings::default(),
        );
        FilingService::new(pipeline, SqliteRunStore::in_memory().unwrap())
    }

    fn manual() -> FilingInput {
        FilingInput::Manual(ManualInput {
            salary: 900_000.0,
            tds_salary: 60_000.0,
            section_80c: 100_000.0,
            ..Default::default()
        })
    }

    fn unreadable_documents() -> FilingInput {
        FilingInput::Documents {
            taxpayer: TaxpayerProfile::default(),
            documents: vec![RawDocument::unreadable("scan.pdf", "no OCR")],
        }
    }

    #[test]
    fn filed_run_is_stored() {
        let service = service();
        let run = service.file(manual()).unwrap();
        assert_eq!(run.state(), FilingState::EVerified);

        let stored = service.show(run.run_id).unwrap();
        assert_eq!(stored, run);
        assert_eq!(service.history().unwrap().len(), 1);
    }

    #[test]
    fn resume_loads_and_saves() {
        let service = service();
        let held = service.file(unreadable_documents()).unwrap();
        assert_eq!(held.state(), FilingState::NeedsReview);

        let income = RawIncomeFields {
            gross_salary: 900_000.0,
            tds_salary: 60_000.0,
            ..Default::default()
        };
        let resumed = service
            .resume(held.run_id, income, RawDeductionFields::default())
            .unwrap();
        assert_eq!(resumed.run_id, held.run_id);
        assert_eq!(resumed.state(), FilingState::EVerified);

        let stored = service.show(held.run_id).unwrap();
        assert_eq!(stored.state(), FilingState::EVerified);
        let summaries = service.history().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].state, FilingState::EVerified);
    }

    #[test]
    fn resume_unknown_run() {
        let service = service();
        let id = Uuid::new_v4();
        let result = service.resume(id, RawIncomeFields::default(), RawDeductionFields::default());
        assert!(matches!(result, Err(PipelineError::RunNotFound(missing)) if missing == id));
    }

    #[test]
    fn resume_verified_run_rejected_and_unchanged() {
        let service = service();
        let run = service.file(manual()).unwrap();
        let result = service.resume(run.run_id, RawIncomeFields::default(), RawDeductionFields::default());
        assert!(matches!(
            result,
            Err(PipelineError::NotResumable { state: FilingState::EVerified, .. })
        ));
        assert_eq!(service.show(run.run_id).unwrap(), run);
    }

    #[test]
    fn describe_uses_keyword_heuristics_offline() {
        let input = service().describe("salary 8.5 lakh, 80C 1.5L");
        assert_eq!(input.salary, 850_000.0);
        assert_eq!(input.section_80c, 150_000.0);
    }
}
