pub mod cancel;
pub mod executor;
pub mod reporter;
pub mod types;

pub use cancel::CancelToken;
pub use executor::{BUILTIN_VARIABLES, ITERATION_VAR, TransactionRunner, VUSER_ID_VAR};
pub use reporter::ScenarioReporter;
pub use types::{
    ExtractionMiss, IterationOutcome, IterationReport, IterationSummary, NotExecuted, Outcome,
    SkipReason, StepFailure, TransactionResult,
};
