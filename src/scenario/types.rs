use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::http::client::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_RESPONSE_TIMEOUT_SECS};
use crate::http::{Method, Request};
use crate::variable::{ExtractionRule, TemplateError, VariableResolver, VariableScope};
use crate::{Result, RuscenarioError};

/// 步骤失败后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// 立即结束本次迭代，剩余步骤不执行
    #[default]
    Abort,
    /// 记录失败后继续执行后续步骤
    Continue,
}

/// 思考时间范围，每次从 [min, max] 均匀采样
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min: Duration,
    pub max: Duration,
}

impl ThinkTime {
    pub fn fixed(duration: Duration) -> Self {
        Self {
            min: duration,
            max: duration,
        }
    }

    /// min 大于 max 时两者交换
    pub fn range(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

/// 请求体模板
#[derive(Debug, Clone, PartialEq)]
pub enum BodyTemplate {
    /// 原始文本，整体渲染
    Text(String),
    /// 结构化 JSON，逐个字符串叶子渲染
    Json(serde_json::Value),
}

/// 请求模板：唯一进行字符串替换的地方
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<BodyTemplate>,
}

impl RequestTemplate {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// 按作用域渲染出可发送的请求
    ///
    /// `default_headers` 是场景级固定 header，同名时步骤自身的 header 优先
    pub fn render(
        &self,
        scope: &VariableScope,
        default_headers: &[(String, String)],
    ) -> Result<Request> {
        let url = VariableResolver::render(&self.url, scope)?;
        let mut request = Request::new(self.method, &url)?;

        for (key, value) in &self.query {
            let value = VariableResolver::render(value, scope)?;
            request = request.with_query(key, &value);
        }

        for (key, value) in default_headers {
            if self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)) {
                continue;
            }
            request = request.with_header(key, &VariableResolver::render(value, scope)?)?;
        }
        for (key, value) in &self.headers {
            request = request.with_header(key, &VariableResolver::render(value, scope)?)?;
        }

        match &self.body {
            Some(BodyTemplate::Text(text)) => {
                request = request.with_text(&VariableResolver::render(text, scope)?);
            }
            Some(BodyTemplate::Json(value)) => {
                request = request.with_json(&VariableResolver::render_json(value, scope)?)?;
            }
            None => {}
        }

        Ok(request)
    }

    /// 模板中引用的所有变量名
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = VariableResolver::placeholders(&self.url);
        let mut push = |found: Vec<String>| {
            for name in found {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        };

        for (_, value) in self.query.iter().chain(self.headers.iter()) {
            push(VariableResolver::placeholders(value));
        }
        match &self.body {
            Some(BodyTemplate::Text(text)) => push(VariableResolver::placeholders(text)),
            Some(BodyTemplate::Json(value)) => push(VariableResolver::json_placeholders(value)),
            None => {}
        }
        names
    }
}

/// 日期偏移天数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOffset {
    Days(i64),
    /// 渲染后解析为整数，如 `"{dayOffset}"`
    Template(String),
}

/// 显式参数赋值，在渲染请求之前执行
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// 渲染模板并保存为文本
    Value { variable: String, template: String },
    /// 当前 UTC 时间偏移若干天后按 strftime 格式保存
    Date {
        variable: String,
        format: String,
        offset: DayOffset,
    },
}

impl Assignment {
    pub fn value(variable: impl Into<String>, template: impl Into<String>) -> Self {
        Assignment::Value {
            variable: variable.into(),
            template: template.into(),
        }
    }

    /// 构造日期赋值，格式非法时返回错误
    pub fn date(variable: impl Into<String>, format: &str, offset: DayOffset) -> Result<Self> {
        let variable = variable.into();
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(RuscenarioError::Scenario(format!(
                "invalid date format '{}' for '{}'",
                format, variable
            )));
        }
        Ok(Assignment::Date {
            variable,
            format: format.to_string(),
            offset,
        })
    }

    pub fn variable(&self) -> &str {
        match self {
            Assignment::Value { variable, .. } | Assignment::Date { variable, .. } => variable,
        }
    }

    pub fn placeholders(&self) -> Vec<String> {
        match self {
            Assignment::Value { template, .. } => VariableResolver::placeholders(template),
            Assignment::Date {
                offset: DayOffset::Template(template),
                ..
            } => VariableResolver::placeholders(template),
            Assignment::Date { .. } => Vec::new(),
        }
    }

    pub fn apply(&self, scope: &mut VariableScope) -> std::result::Result<(), TemplateError> {
        match self {
            Assignment::Value { variable, template } => {
                let value = VariableResolver::render(template, scope)?;
                scope.insert(variable.clone(), value);
            }
            Assignment::Date {
                variable,
                format,
                offset,
            } => {
                let days = match offset {
                    DayOffset::Days(days) => *days,
                    DayOffset::Template(template) => {
                        let rendered = VariableResolver::render(template, scope)?;
                        rendered.trim().parse::<i64>().map_err(|_| {
                            TemplateError::InvalidValue {
                                variable: variable.clone(),
                                message: format!("day offset '{}' is not an integer", rendered),
                            }
                        })?
                    }
                };
                let invalid = |message: &str| TemplateError::InvalidValue {
                    variable: variable.clone(),
                    message: message.to_string(),
                };
                let at = TimeDelta::try_days(days)
                    .and_then(|delta| Utc::now().checked_add_signed(delta))
                    .ok_or_else(|| invalid("day offset out of range"))?;

                let mut formatted = String::new();
                write!(formatted, "{}", at.format(format))
                    .map_err(|_| invalid("date format could not be applied"))?;
                scope.insert(variable.clone(), formatted);
            }
        }
        Ok(())
    }
}

/// 重复执行：每个值绑定到 `variable` 后发送一次请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeat {
    pub variable: String,
    pub values: Vec<String>,
}

/// 场景中的一个事务步骤
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub request: RequestTemplate,
    pub expected_status: BTreeSet<u16>,
    pub extractions: Vec<ExtractionRule>,
    pub on_failure: FailurePolicy,
    pub think_time: Option<ThinkTime>,
    pub assignments: Vec<Assignment>,
    pub repeat: Option<Repeat>,
}

impl Step {
    /// 默认期望状态码 200，失败即中止
    pub fn new(name: impl Into<String>, method: Method, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request: RequestTemplate::new(method, url),
            expected_status: BTreeSet::from([200]),
            extractions: Vec::new(),
            on_failure: FailurePolicy::Abort,
            think_time: None,
            assignments: Vec::new(),
            repeat: None,
        }
    }

    pub fn expect(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.expected_status = codes.into_iter().collect();
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body_json(mut self, body: serde_json::Value) -> Self {
        self.request.body = Some(BodyTemplate::Json(body));
        self
    }

    pub fn with_body_text(mut self, body: impl Into<String>) -> Self {
        self.request.body = Some(BodyTemplate::Text(body.into()));
        self
    }

    pub fn extract(mut self, rule: ExtractionRule) -> Self {
        self.extractions.push(rule);
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = Some(think_time);
        self
    }

    pub fn assign(mut self, assignment: Assignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    pub fn repeat(mut self, variable: impl Into<String>, values: Vec<String>) -> Self {
        self.repeat = Some(Repeat {
            variable: variable.into(),
            values,
        });
        self
    }

    pub fn accepts(&self, status: u16) -> bool {
        self.expected_status.contains(&status)
    }
}

/// 场景级设置
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSettings {
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// 步骤未单独配置时使用的思考时间
    pub think_time: Option<ThinkTime>,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            response_timeout: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
            think_time: None,
        }
    }
}

/// 一次用户旅程：按顺序执行的步骤序列
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
    /// 每个请求都会带上的固定 header
    pub headers: Vec<(String, String)>,
    /// 场景默认变量，优先级最低
    pub variables: VariableScope,
    pub settings: ScenarioSettings,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            headers: Vec::new(),
            variables: VariableScope::new(),
            settings: ScenarioSettings::default(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.settings.think_time = Some(think_time);
        self
    }

    /// 步骤生效的思考时间：步骤配置优先，其次场景配置
    pub fn think_time_for(&self, step: &Step) -> Option<ThinkTime> {
        step.think_time.or(self.settings.think_time)
    }

    /// 以场景默认变量为底，叠加外部传入的初始参数
    pub fn initial_scope(&self, parameters: VariableScope) -> VariableScope {
        let mut scope = self.variables.clone();
        scope.merge(parameters);
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> VariableScope {
        let mut scope = VariableScope::new();
        scope.insert("api", "http://localhost:3000/api");
        scope.insert("eventTypeId", 42i64);
        scope.insert("sessionToken", "tok");
        scope
    }

    #[test]
    fn test_render_request() {
        let step = Step::new(
            "T03_Get_Available_Slots",
            Method::Get,
            "{api}/trpc/public.slots.getSchedule",
        )
        .with_query("eventTypeId", "{eventTypeId}")
        .with_header("Authorization", "Bearer {sessionToken}");

        let defaults = vec![("Accept".to_string(), "application/json".to_string())];
        let request = step.request.render(&scope(), &defaults).unwrap();
        assert_eq!(
            request.url.as_str(),
            "http://localhost:3000/api/trpc/public.slots.getSchedule?eventTypeId=42"
        );
        assert_eq!(request.headers.get("authorization").unwrap(), "Bearer tok");
        assert_eq!(request.headers.get("accept").unwrap(), "application/json");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_step_header_overrides_default() {
        let step = Step::new("s", Method::Get, "{api}/x").with_header("accept", "text/plain");
        let defaults = vec![("Accept".to_string(), "application/json".to_string())];
        let request = step.request.render(&scope(), &defaults).unwrap();
        assert_eq!(request.headers.get("accept").unwrap(), "text/plain");
    }

    #[test]
    fn test_render_json_body() {
        let step = Step::new("s", Method::Post, "{api}/book/event").with_body_json(json!({
            "eventTypeId": "{eventTypeId}",
            "metadata": {}
        }));
        let request = step.request.render(&scope(), &[]).unwrap();
        let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"eventTypeId": 42, "metadata": {}}));
        assert_eq!(
            request.headers.get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_render_unresolved_is_error() {
        let step = Step::new("s", Method::Get, "{api}/bookings/{bookingUid}");
        let err = step.request.render(&scope(), &[]).unwrap_err();
        assert!(matches!(err, RuscenarioError::Template(_)));
    }

    #[test]
    fn test_render_invalid_url_is_error() {
        let step = Step::new("s", Method::Get, "{eventTypeId}/relative");
        assert!(step.request.render(&scope(), &[]).is_err());
    }

    #[test]
    fn test_placeholders() {
        let step = Step::new("s", Method::Post, "{api}/x")
            .with_query("q", "{query}")
            .with_header("X-User", "{userId}")
            .with_body_json(json!({"a": "{api}", "b": ["{bookerName}"]}));
        assert_eq!(
            step.request.placeholders(),
            vec!["api", "query", "userId", "bookerName"]
        );
    }

    #[test]
    fn test_value_assignment() {
        let mut scope = scope();
        Assignment::value("bookerName", "Load {eventTypeId}")
            .apply(&mut scope)
            .unwrap();
        assert_eq!(scope.get_string("bookerName").as_deref(), Some("Load 42"));
    }

    #[test]
    fn test_date_assignment() {
        let mut scope = scope();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        Assignment::date("startDate", "%Y-%m-%d", DayOffset::Days(0))
            .unwrap()
            .apply(&mut scope)
            .unwrap();
        let stored = scope.get_string("startDate").unwrap();
        assert_eq!(stored.len(), 10);
        // 跨零点时允许相差一天
        let tomorrow = (Utc::now() + TimeDelta::days(1)).format("%Y-%m-%d").to_string();
        assert!(stored == today || stored == tomorrow);
    }

    #[test]
    fn test_date_assignment_template_offset() {
        let mut scope = scope();
        scope.insert("dayOffset", "x");
        let err = Assignment::date("queryDate", "%Y-%m-%d", DayOffset::Template("{dayOffset}".into()))
            .unwrap()
            .apply(&mut scope)
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidValue { .. }));

        scope.insert("dayOffset", "7");
        Assignment::date("queryDate", "%Y", DayOffset::Template("{dayOffset}".into()))
            .unwrap()
            .apply(&mut scope)
            .unwrap();
        assert_eq!(scope.get_string("queryDate").unwrap().len(), 4);
    }

    #[test]
    fn test_invalid_date_format() {
        assert!(Assignment::date("d", "%Y-%Q", DayOffset::Days(0)).is_err());
    }

    #[test]
    fn test_think_time_sample_in_range() {
        let think = ThinkTime::range(Duration::from_millis(20), Duration::from_millis(10));
        assert_eq!(think.min, Duration::from_millis(10));
        for _ in 0..50 {
            let d = think.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert_eq!(
            ThinkTime::fixed(Duration::from_millis(5)).sample(),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn test_think_time_resolution() {
        let scenario = Scenario::new("s").with_think_time(ThinkTime::fixed(Duration::from_secs(2)));
        let plain = Step::new("a", Method::Get, "http://localhost/");
        let custom = plain.clone().with_think_time(ThinkTime::fixed(Duration::ZERO));
        assert_eq!(
            scenario.think_time_for(&plain),
            Some(ThinkTime::fixed(Duration::from_secs(2)))
        );
        assert_eq!(
            scenario.think_time_for(&custom),
            Some(ThinkTime::fixed(Duration::ZERO))
        );
    }

    #[test]
    fn test_initial_scope_precedence() {
        let scenario = Scenario::new("s")
            .with_variable("api", "http://default")
            .with_variable("slug", "30min");
        let mut params = VariableScope::new();
        params.insert("api", "http://override");
        let scope = scenario.initial_scope(params);
        assert_eq!(scope.get_string("api").as_deref(), Some("http://override"));
        assert_eq!(scope.get_string("slug").as_deref(), Some("30min"));
    }

    #[test]
    fn test_step_accepts() {
        let step = Step::new("login", Method::Post, "http://localhost/").expect([200, 302]);
        assert!(step.accepts(302));
        assert!(!step.accepts(401));
    }
}
