use crate::variable::types::VariableScope;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// 模板渲染错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// 模板引用了作用域中不存在的变量
    #[error("unresolved placeholder(s): {}", format_names(.names))]
    Unresolved { names: Vec<String> },

    /// 渲染结果不是预期的格式（如日期偏移不是整数）
    #[error("invalid value for '{variable}': {message}")]
    InvalidValue { variable: String, message: String },
}

fn format_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("{{{}}}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholder_regex() -> &'static Regex {
    static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
    VAR_REGEX.get_or_init(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap())
}

fn whole_placeholder_regex() -> &'static Regex {
    static WHOLE_REGEX: OnceLock<Regex> = OnceLock::new();
    WHOLE_REGEX.get_or_init(|| Regex::new(r"^\{([a-zA-Z_][a-zA-Z0-9_]*)\}$").unwrap())
}

/// 模板渲染器
///
/// 占位符语法为 `{variableName}`。JSON 字面量里的 `{"` 与 `{}` 不会被识别为占位符
pub struct VariableResolver;

impl VariableResolver {
    /// 替换文本中的所有 {variable} 占位符
    ///
    /// 任何一个占位符找不到对应变量都会返回错误，不会发出带字面占位符的请求
    pub fn render(text: &str, scope: &VariableScope) -> Result<String, TemplateError> {
        let missing = Self::missing(text, scope);
        if !missing.is_empty() {
            return Err(TemplateError::Unresolved { names: missing });
        }

        Ok(placeholder_regex()
            .replace_all(text, |caps: &Captures| {
                scope.get_string(&caps[1]).unwrap_or_default()
            })
            .to_string())
    }

    /// 渲染结构化 JSON：所有字符串叶子节点和对象键都会被渲染
    ///
    /// 恰好只包含一个占位符的字符串（如 `"{eventTypeId}"`）替换为变量的原始类型，
    /// 数字保持为数字，JSON 片段原样嵌入
    pub fn render_json(
        value: &serde_json::Value,
        scope: &VariableScope,
    ) -> Result<serde_json::Value, TemplateError> {
        let mut missing = Vec::new();
        for name in Self::json_placeholders(value) {
            if !scope.contains(&name) {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(TemplateError::Unresolved { names: missing });
        }

        Self::render_json_value(value, scope)
    }

    fn render_json_value(
        value: &serde_json::Value,
        scope: &VariableScope,
    ) -> Result<serde_json::Value, TemplateError> {
        use serde_json::Value;

        match value {
            Value::String(s) => {
                if let Some(caps) = whole_placeholder_regex().captures(s)
                    && let Some(var) = scope.get(&caps[1])
                {
                    return Ok(var.to_json());
                }
                Ok(Value::String(Self::render(s, scope)?))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| Self::render_json_value(item, scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut rendered = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    rendered.insert(
                        Self::render(key, scope)?,
                        Self::render_json_value(item, scope)?,
                    );
                }
                Ok(Value::Object(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    /// 列出文本中引用的变量名（去重，保持出现顺序）
    pub fn placeholders(text: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in placeholder_regex().captures_iter(text) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// 列出 JSON 中字符串叶子和对象键引用的变量名
    pub fn json_placeholders(value: &serde_json::Value) -> Vec<String> {
        let mut names = Vec::new();
        Self::collect_json_placeholders(value, &mut names);
        names
    }

    fn collect_json_placeholders(value: &serde_json::Value, names: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) => {
                for name in Self::placeholders(s) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    Self::collect_json_placeholders(item, names);
                }
            }
            serde_json::Value::Object(map) => {
                for (key, item) in map {
                    for name in Self::placeholders(key) {
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                    Self::collect_json_placeholders(item, names);
                }
            }
            _ => {}
        }
    }

    fn missing(text: &str, scope: &VariableScope) -> Vec<String> {
        Self::placeholders(text)
            .into_iter()
            .filter(|name| !scope.contains(name))
            .collect()
    }

    /// 解析并替换系统环境变量 ${VAR}
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            let env_name = &caps[1];
            std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
    }
}
