use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::extract::ExtractSource;
use crate::http::Method;
use crate::scenario::types::{
    Assignment, DayOffset, FailurePolicy, Repeat, Scenario, ScenarioSettings, Step, ThinkTime,
};
use crate::variable::{ExtractionRule, VariableScope, VariableValue};
use crate::{Result, RuscenarioError};

/// 场景文件的 TOML 结构
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDefinition {
    pub name: String,
    #[serde(default)]
    pub settings: SettingsDefinition,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsDefinition {
    pub connect_timeout_secs: Option<u64>,
    pub response_timeout_secs: Option<u64>,
    pub think_time: Option<ThinkTimeDefinition>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThinkTimeDefinition {
    pub min_ms: u64,
    /// 省略时为固定思考时间
    pub max_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    pub name: String,
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<BodyDefinition>,
    pub expect: Option<Vec<u16>>,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    pub think_time: Option<ThinkTimeDefinition>,
    #[serde(default)]
    pub extract: Vec<ExtractDefinition>,
    #[serde(default)]
    pub assign: Vec<AssignDefinition>,
    pub repeat: Option<RepeatDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyDefinition {
    Json(serde_json::Value),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractDefinition {
    pub var: String,
    pub json: Option<String>,
    pub regex: Option<String>,
    #[serde(default)]
    pub source: ExtractSource,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignDefinition {
    pub var: String,
    pub value: Option<String>,
    /// strftime 格式
    pub date: Option<String>,
    pub offset_days: Option<OffsetDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OffsetDefinition {
    Days(i64),
    Template(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepeatDefinition {
    pub var: String,
    pub values: Vec<serde_json::Value>,
}

impl From<ThinkTimeDefinition> for ThinkTime {
    fn from(def: ThinkTimeDefinition) -> Self {
        let min = Duration::from_millis(def.min_ms);
        let max = Duration::from_millis(def.max_ms.unwrap_or(def.min_ms));
        ThinkTime::range(min, max)
    }
}

fn definition_error(step: &str, message: impl std::fmt::Display) -> RuscenarioError {
    RuscenarioError::Scenario(format!("step '{}': {}", step, message))
}

impl TryFrom<ExtractDefinition> for ExtractionRule {
    type Error = RuscenarioError;

    fn try_from(def: ExtractDefinition) -> Result<Self> {
        let rule = match (def.json, def.regex) {
            (Some(path), None) => ExtractionRule::json_path(def.var, &path)?,
            (None, Some(pattern)) => ExtractionRule::regex(def.var, &pattern)?,
            _ => {
                return Err(RuscenarioError::Scenario(format!(
                    "extraction of '{}' needs exactly one of 'json' or 'regex'",
                    def.var
                )));
            }
        };
        Ok(match def.source {
            ExtractSource::Headers => rule.from_headers(),
            ExtractSource::Body => rule,
        })
    }
}

impl TryFrom<AssignDefinition> for Assignment {
    type Error = RuscenarioError;

    fn try_from(def: AssignDefinition) -> Result<Self> {
        match (def.value, def.date) {
            (Some(template), None) if def.offset_days.is_none() => {
                Ok(Assignment::value(def.var, template))
            }
            (None, Some(format)) => {
                let offset = match def.offset_days {
                    Some(OffsetDefinition::Days(days)) => DayOffset::Days(days),
                    Some(OffsetDefinition::Template(template)) => DayOffset::Template(template),
                    None => DayOffset::Days(0),
                };
                Assignment::date(def.var, &format, offset)
            }
            _ => Err(RuscenarioError::Scenario(format!(
                "assignment of '{}' needs either 'value' or 'date' (with optional 'offset_days')",
                def.var
            ))),
        }
    }
}

impl TryFrom<StepDefinition> for Step {
    type Error = RuscenarioError;

    fn try_from(def: StepDefinition) -> Result<Self> {
        if def.name.trim().is_empty() {
            return Err(RuscenarioError::Scenario("step name must not be empty".into()));
        }
        let name = def.name;

        let mut step = Step::new(name.clone(), def.method, def.url).on_failure(def.on_failure);

        if let Some(codes) = def.expect {
            if codes.is_empty() {
                return Err(definition_error(&name, "'expect' must list at least one status"));
            }
            if let Some(code) = codes.iter().find(|c| !(100..600).contains(*c)) {
                return Err(definition_error(&name, format!("invalid status code {}", code)));
            }
            step = step.expect(codes);
        }

        for (key, value) in def.query {
            step = step.with_query(key, value);
        }
        for (key, value) in def.headers {
            step = step.with_header(key, value);
        }
        step = match def.body {
            Some(BodyDefinition::Json(value)) => step.with_body_json(value),
            Some(BodyDefinition::Text(text)) => step.with_body_text(text),
            None => step,
        };

        if let Some(think_time) = def.think_time {
            step = step.with_think_time(think_time.into());
        }

        for extract in def.extract {
            let rule = ExtractionRule::try_from(extract).map_err(|e| definition_error(&name, e))?;
            step = step.extract(rule);
        }
        for assign in def.assign {
            let assignment = Assignment::try_from(assign).map_err(|e| definition_error(&name, e))?;
            step = step.assign(assignment);
        }

        if let Some(repeat) = def.repeat {
            if repeat.values.is_empty() {
                return Err(definition_error(&name, "'repeat.values' must not be empty"));
            }
            let values = repeat
                .values
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect();
            step.repeat = Some(Repeat {
                variable: repeat.var,
                values,
            });
        }

        Ok(step)
    }
}

impl TryFrom<ScenarioDefinition> for Scenario {
    type Error = RuscenarioError;

    fn try_from(def: ScenarioDefinition) -> Result<Self> {
        if def.steps.is_empty() {
            return Err(RuscenarioError::Scenario(format!(
                "scenario '{}' has no steps",
                def.name
            )));
        }

        let defaults = ScenarioSettings::default();
        let settings = ScenarioSettings {
            connect_timeout: def
                .settings
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            response_timeout: def
                .settings
                .response_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.response_timeout),
            think_time: def.settings.think_time.map(ThinkTime::from),
        };

        let mut variables = VariableScope::new();
        for (key, value) in &def.variables {
            variables.insert(key.clone(), VariableValue::from_json(value));
        }

        let mut seen = HashSet::new();
        let mut steps = Vec::with_capacity(def.steps.len());
        for step_def in def.steps {
            if !seen.insert(step_def.name.clone()) {
                return Err(definition_error(&step_def.name, "duplicate step name"));
            }
            steps.push(Step::try_from(step_def)?);
        }

        Ok(Scenario {
            name: def.name,
            steps,
            headers: def.headers.into_iter().collect(),
            variables,
            settings,
        })
    }
}

/// 场景文件加载器
pub struct ScenarioLoader;

impl ScenarioLoader {
    /// 从文件加载场景
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Scenario> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// 解析 TOML 文本并构建场景
    pub fn parse(content: &str) -> Result<Scenario> {
        let definition: ScenarioDefinition = toml::from_str(content)?;
        Scenario::try_from(definition)
    }
}
