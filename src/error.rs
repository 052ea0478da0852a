use thiserror::Error;

use crate::extract::ExtractError;
use crate::variable::TemplateError;

#[derive(Error, Debug)]
pub enum RuscenarioError {
    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("无效的 URL: {0}")]
    InvalidUrl(String),

    #[error("场景定义错误: {0}")]
    Scenario(String),

    #[error("模板渲染失败: {0}")]
    Template(#[from] TemplateError),

    #[error("提取表达式错误: {0}")]
    Extract(#[from] ExtractError),

    #[error("HTTP 请求失败: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML 解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

}

/// Result type for ruscenario crate
pub type Result<T> = std::result::Result<T, RuscenarioError>;
