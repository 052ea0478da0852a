use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 提取错误类型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("Invalid JSON path '{path}': {message}")]
    InvalidJsonPath { path: String, message: String },

    #[error("Invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("Response body is not valid JSON: {0}")]
    NotJson(String),

    #[error("No match for {0}")]
    NoMatch(String),
}

/// 提取来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractSource {
    /// 响应 Body
    #[default]
    Body,
    /// 响应 Header
    Headers,
}

impl fmt::Display for ExtractSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractSource::Body => write!(f, "body"),
            ExtractSource::Headers => write!(f, "headers"),
        }
    }
}

/// JSONPath 路径段
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name` 或 `['name']`
    Child(String),
    /// `[0]`，负数从末尾计
    Index(i64),
    /// `.*` 或 `[*]`
    Wildcard,
    /// `[?(@.field == 'value')]`
    Filter(Filter),
}

/// 过滤表达式
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// `@` 之后的字段路径，空路径表示元素本身
    pub path: Vec<String>,
    /// 比较条件；为 None 时只检查字段是否存在
    pub condition: Option<(FilterOp, serde_json::Value)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
}

/// 编译后的 JSONPath 表达式
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    pub(crate) raw: String,
    pub(crate) segments: Vec<Segment>,
}

impl JsonPath {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// 编译后的正则表达式
#[derive(Debug, Clone)]
pub struct RegexPattern {
    regex: Regex,
}

impl RegexPattern {
    pub fn new(pattern: &str) -> Result<Self, ExtractError> {
        let regex = Regex::new(pattern).map_err(|e| ExtractError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// 提取表达式
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    JsonPath(JsonPath),
    Regex(RegexPattern),
}

impl Expression {
    pub fn json_path(path: &str) -> Result<Self, ExtractError> {
        crate::extract::parse_json_path(path).map(Expression::JsonPath)
    }

    pub fn regex(pattern: &str) -> Result<Self, ExtractError> {
        RegexPattern::new(pattern).map(Expression::Regex)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::JsonPath(path) => write!(f, "{}", path),
            Expression::Regex(pattern) => write!(f, "regex({})", pattern.as_str()),
        }
    }
}
