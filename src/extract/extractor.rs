use crate::extract::types::{ExtractError, ExtractSource, Expression, JsonPath, RegexPattern};
use crate::http::Response;
use crate::variable::VariableValue;

/// 从响应中提取值
///
/// 多个匹配时取第一个；没有匹配返回 `ExtractError::NoMatch`
pub fn extract_value(
    response: &Response,
    expression: &Expression,
    source: ExtractSource,
) -> Result<VariableValue, ExtractError> {
    match (expression, source) {
        (Expression::JsonPath(path), ExtractSource::Body) => {
            let json: serde_json::Value = serde_json::from_str(&response.body)
                .map_err(|e| ExtractError::NotJson(e.to_string()))?;
            extract_from_json(&json, path)
        }
        (Expression::JsonPath(path), ExtractSource::Headers) => {
            extract_from_json(&response.headers_json(), path)
        }
        (Expression::Regex(pattern), ExtractSource::Body) => {
            extract_from_text(&response.body, pattern)
        }
        (Expression::Regex(pattern), ExtractSource::Headers) => {
            extract_from_text(&response.header_block(), pattern)
        }
    }
}

fn extract_from_json(json: &serde_json::Value, path: &JsonPath) -> Result<VariableValue, ExtractError> {
    path.first(json)
        .map(VariableValue::from_json)
        .ok_or_else(|| ExtractError::NoMatch(path.to_string()))
}

/// 有捕获组时取第 1 组，否则取整个匹配
fn extract_from_text(text: &str, pattern: &RegexPattern) -> Result<VariableValue, ExtractError> {
    let caps = pattern
        .regex()
        .captures(text)
        .ok_or_else(|| ExtractError::NoMatch(format!("regex({})", pattern.as_str())))?;

    let matched = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
    matched
        .map(|s| VariableValue::Text(s.to_string()))
        .ok_or_else(|| ExtractError::NoMatch(format!("regex({})", pattern.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::Status;
    use reqwest::header::HeaderMap;
    use serde_json::json;
    use std::time::Duration;

    fn create_test_response(status: u16, body: &str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert(
            "set-cookie",
            "next-auth.session-token=sess-123; Path=/; HttpOnly".parse().unwrap(),
        );

        Response {
            status: Status::new(status).unwrap(),
            headers,
            body: body.to_string(),
            duration: Duration::from_millis(123),
        }
    }

    #[test]
    fn test_extract_body_string() {
        let response = create_test_response(200, r#"{"session": {"token": "abc"}}"#);
        let expr = Expression::json_path("$.session.token").unwrap();
        let value = extract_value(&response, &expr, ExtractSource::Body).unwrap();
        assert_eq!(value, VariableValue::Text("abc".to_string()));
    }

    #[test]
    fn test_extract_body_number_keeps_type() {
        let response = create_test_response(200, r#"{"user": {"id": 7, "email": "a@b.c"}}"#);
        let expr = Expression::json_path("$.user.id").unwrap();
        let value = extract_value(&response, &expr, ExtractSource::Body).unwrap();
        assert_eq!(value.to_json(), json!(7));
    }

    #[test]
    fn test_extract_body_fragment() {
        let response = create_test_response(200, r#"{"result": {"data": {"slots": {"a": [1]}}}}"#);
        let expr = Expression::json_path("$.result.data.slots").unwrap();
        let value = extract_value(&response, &expr, ExtractSource::Body).unwrap();
        assert_eq!(value, VariableValue::Json(json!({"a": [1]})));
    }

    #[test]
    fn test_extract_body_no_match() {
        let response = create_test_response(200, r#"{"result": {"data": []}}"#);
        let expr = Expression::json_path("$.result.data[0].id").unwrap();
        let err = extract_value(&response, &expr, ExtractSource::Body).unwrap_err();
        assert_eq!(err, ExtractError::NoMatch("$.result.data[0].id".to_string()));
    }

    #[test]
    fn test_extract_body_not_json() {
        let response = create_test_response(200, "<html>login</html>");
        let expr = Expression::json_path("$.session.token").unwrap();
        let err = extract_value(&response, &expr, ExtractSource::Body).unwrap_err();
        assert!(matches!(err, ExtractError::NotJson(_)));
    }

    #[test]
    fn test_extract_regex_group() {
        let response = create_test_response(200, r#"{"csrfToken":"tok-42"}"#);
        let expr = Expression::regex(r#"csrfToken":"([^"]+)""#).unwrap();
        let value = extract_value(&response, &expr, ExtractSource::Body).unwrap();
        assert_eq!(value, VariableValue::Text("tok-42".to_string()));
    }

    #[test]
    fn test_extract_regex_whole_match() {
        let response = create_test_response(200, "booking uid-9f8e confirmed");
        let expr = Expression::regex(r"uid-[0-9a-f]+").unwrap();
        let value = extract_value(&response, &expr, ExtractSource::Body).unwrap();
        assert_eq!(value, VariableValue::Text("uid-9f8e".to_string()));
    }

    #[test]
    fn test_extract_regex_from_headers() {
        let response = create_test_response(200, "{}");
        let expr = Expression::regex(r"session-token=([^;]+)").unwrap();
        let value = extract_value(&response, &expr, ExtractSource::Headers).unwrap();
        assert_eq!(value, VariableValue::Text("sess-123".to_string()));
    }

    #[test]
    fn test_extract_json_path_from_headers() {
        let response = create_test_response(200, "{}");
        let expr = Expression::json_path("$['content-type']").unwrap();
        let value = extract_value(&response, &expr, ExtractSource::Headers).unwrap();
        assert_eq!(value, VariableValue::Text("application/json".to_string()));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            Expression::regex("("),
            Err(ExtractError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let response = create_test_response(200, r#"{"items": [{"id": 1}, {"id": 2}]}"#);
        let expr = Expression::json_path("$.items[*].id").unwrap();
        let first = extract_value(&response, &expr, ExtractSource::Body);
        let second = extract_value(&response, &expr, ExtractSource::Body);
        assert_eq!(first, second);
        assert_eq!(first.unwrap().to_string(), "1");
    }
}
