use ruscenario::variable::TemplateError;
use ruscenario::{Result, RuscenarioError, ScenarioLoader};

#[test]
fn test_parse_error() {
    let err = RuscenarioError::ParseError("test error".to_string());
    assert_eq!(err.to_string(), "解析错误: test error");
}

#[test]
fn test_invalid_url() {
    let err = RuscenarioError::InvalidUrl("not a url".to_string());
    assert_eq!(err.to_string(), "无效的 URL: not a url");
}

#[test]
fn test_scenario_error() {
    let err = RuscenarioError::Scenario("scenario 'x' has no steps".to_string());
    assert_eq!(err.to_string(), "场景定义错误: scenario 'x' has no steps");
}

#[test]
fn test_template_error_conversion() {
    let err: RuscenarioError = TemplateError::Unresolved {
        names: vec!["eventTypeId".to_string()],
    }
    .into();
    assert!(matches!(err, RuscenarioError::Template(_)));
    assert!(err.to_string().contains("eventTypeId"));
}

#[test]
fn test_toml_error_conversion() {
    let err = ScenarioLoader::parse("name = ").unwrap_err();
    assert!(matches!(err, RuscenarioError::TomlError(_)));
}

#[test]
fn test_io_error_conversion() {
    let err = ScenarioLoader::load_from_path("/nonexistent/ruscenario/booking.toml").unwrap_err();
    assert!(matches!(err, RuscenarioError::IoError(_)));
    assert!(err.to_string().starts_with("IO 错误"));
}

#[test]
fn test_result_type() {
    fn returns_error() -> Result<()> {
        Err(RuscenarioError::ParseError("test".to_string()))
    }

    match returns_error() {
        Err(RuscenarioError::ParseError(msg)) => assert_eq!(msg, "test"),
        _ => panic!("Expected ParseError"),
    }
}
