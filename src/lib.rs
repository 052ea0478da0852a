pub mod error;
pub mod extract;
pub mod http;
pub mod logger;
pub mod runner;
pub mod scenario;
pub mod variable;

// Re-export commonly used types
pub use error::{Result, RuscenarioError};
pub use runner::{CancelToken, IterationReport, TransactionRunner};
pub use scenario::{Scenario, ScenarioLoader, Step};
pub use variable::VariableScope;
