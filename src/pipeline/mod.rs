pub mod aggregation;
pub mod deductions;
pub mod extraction;
pub mod form;
pub mod import;
pub mod intake;
pub mod oracle;
pub mod orchestrator;
pub mod prompt;
pub mod scenario;
pub mod service;
pub mod steps;
pub mod tax;
pub mod tips;
pub mod validation;
pub mod verification;

pub use orchestrator::{FilingPipeline, PipelineError};
pub use service::FilingService;
