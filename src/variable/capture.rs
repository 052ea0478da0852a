use crate::extract::{ExtractError, ExtractSource, Expression, extract_value};
use crate::http::Response;
use crate::variable::types::VariableValue;

/// 变量提取规则：从响应中提取值并写入作用域
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRule {
    /// 目标变量名称
    pub variable: String,

    /// 提取表达式
    pub expression: Expression,

    /// 提取来源
    pub source: ExtractSource,
}

impl ExtractionRule {
    pub fn new(variable: impl Into<String>, expression: Expression, source: ExtractSource) -> Self {
        Self {
            variable: variable.into(),
            expression,
            source,
        }
    }

    /// 用 JSONPath 从 Body 提取
    /// 示例: `$.session.token`, `$.result.data[0].id`
    pub fn json_path(variable: impl Into<String>, path: &str) -> Result<Self, ExtractError> {
        Ok(Self::new(
            variable,
            Expression::json_path(path)?,
            ExtractSource::Body,
        ))
    }

    /// 用正则从 Body 提取
    /// 示例: `csrfToken":"([^"]+)"`
    pub fn regex(variable: impl Into<String>, pattern: &str) -> Result<Self, ExtractError> {
        Ok(Self::new(
            variable,
            Expression::regex(pattern)?,
            ExtractSource::Body,
        ))
    }

    /// 改为从响应 Header 提取
    pub fn from_headers(mut self) -> Self {
        self.source = ExtractSource::Headers;
        self
    }

    /// 对响应求值
    pub fn apply(&self, response: &Response) -> Result<VariableValue, ExtractError> {
        extract_value(response, &self.expression, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::Status;
    use reqwest::header::HeaderMap;
    use std::time::Duration;

    #[test]
    fn test_json_path_rule() {
        let rule = ExtractionRule::json_path("sessionToken", "$.session.token").unwrap();
        assert_eq!(rule.variable, "sessionToken");
        assert_eq!(rule.source, ExtractSource::Body);
        assert_eq!(rule.expression.to_string(), "$.session.token");
    }

    #[test]
    fn test_regex_rule_from_headers() {
        let rule = ExtractionRule::regex("cookie", r"session=([^;]+)")
            .unwrap()
            .from_headers();
        assert_eq!(rule.source, ExtractSource::Headers);
    }

    #[test]
    fn test_malformed_rules_rejected() {
        assert!(ExtractionRule::json_path("id", "result.id").is_err());
        assert!(ExtractionRule::regex("id", "([a-z]").is_err());
    }

    #[test]
    fn test_apply() {
        let response = Response {
            status: Status::new(200).unwrap(),
            headers: HeaderMap::new(),
            body: r#"{"uid": "bk-1", "id": 99}"#.to_string(),
            duration: Duration::from_millis(1),
        };
        let rule = ExtractionRule::json_path("bookingId", "$.id").unwrap();
        assert_eq!(rule.apply(&response).unwrap().to_string(), "99");
    }
}
