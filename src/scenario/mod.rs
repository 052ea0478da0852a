/// 场景模块 - 步骤、请求模板与场景文件加载
pub mod loader;
pub mod types;
pub mod validate;

pub use loader::{ScenarioDefinition, ScenarioLoader};
pub use types::{
    Assignment, BodyTemplate, DayOffset, FailurePolicy, Repeat, RequestTemplate, Scenario,
    ScenarioSettings, Step, ThinkTime,
};
pub use validate::UnresolvedReference;
