pub mod capture;
pub mod config;
pub mod resolver;
pub mod types;

pub use capture::ExtractionRule;
pub use config::ConfigLoader;
pub use resolver::{TemplateError, VariableResolver};
pub use types::{Environment, VariableConfig, VariableScope, VariableValue};
