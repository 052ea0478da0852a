use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 变量值：字符串、数字或不透明的 JSON 片段
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    Text(String),
    Number(serde_json::Number),
    Json(serde_json::Value),
}

impl VariableValue {
    /// 从 JSON 值构造：字符串与数字保留类型，其余作为 JSON 片段
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => VariableValue::Text(s.clone()),
            serde_json::Value::Number(n) => VariableValue::Number(n.clone()),
            other => VariableValue::Json(other.clone()),
        }
    }

    /// 转换为 JSON 值（用于结构化 body 中的整值替换）
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            VariableValue::Text(s) => serde_json::Value::String(s.clone()),
            VariableValue::Number(n) => serde_json::Value::Number(n.clone()),
            VariableValue::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Text(s) => f.write_str(s),
            VariableValue::Number(n) => write!(f, "{}", n),
            VariableValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::Text(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::Text(value)
    }
}

impl From<&String> for VariableValue {
    fn from(value: &String) -> Self {
        VariableValue::Text(value.clone())
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        VariableValue::Number(value.into())
    }
}

impl From<serde_json::Value> for VariableValue {
    fn from(value: serde_json::Value) -> Self {
        VariableValue::from_json(&value)
    }
}

/// 变量作用域，一次迭代独占一份
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableScope {
    /// 变量映射表
    variables: HashMap<String, VariableValue>,
}

impl VariableScope {
    /// 创建新的空作用域
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入变量，同名变量会被覆盖
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<VariableValue>) {
        self.variables.insert(key.into(), value.into());
    }

    /// 获取变量值
    pub fn get(&self, key: &str) -> Option<&VariableValue> {
        self.variables.get(key)
    }

    /// 获取变量的文本形式
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.variables.get(key).map(|v| v.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// 批量插入变量
    pub fn extend(&mut self, vars: HashMap<String, String>) {
        for (key, value) in vars {
            self.insert(key, value);
        }
    }

    /// 用另一个作用域覆盖当前作用域
    pub fn merge(&mut self, other: VariableScope) {
        self.variables.extend(other.variables);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(|k| k.as_str())
    }

    /// 变量数量
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// 环境配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Environment {
    /// 变量映射
    #[serde(flatten)]
    pub variables: HashMap<String, String>,
}

/// 完整的环境配置文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VariableConfig {
    /// 所有环境配置
    #[serde(default)]
    pub environments: HashMap<String, Environment>,
}

impl VariableConfig {
    /// 获取指定环境的变量
    pub fn get_environment(&self, env_name: &str) -> Option<&Environment> {
        self.environments.get(env_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_basic() {
        let mut scope = VariableScope::new();
        assert!(scope.is_empty());

        scope.insert("slug", "30min");
        scope.insert("eventTypeId", 42i64);
        assert_eq!(scope.len(), 2);
        assert_eq!(scope.get_string("slug").as_deref(), Some("30min"));
        assert_eq!(scope.get_string("eventTypeId").as_deref(), Some("42"));
        assert_eq!(scope.get("missing"), None);
    }

    #[test]
    fn test_scope_overwrite() {
        let mut scope = VariableScope::new();
        scope.insert("token", "first");
        scope.insert("token", "second");
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.get("token"), Some(&VariableValue::from("second")));
    }

    #[test]
    fn test_scope_merge_overrides() {
        let mut base = VariableScope::new();
        base.insert("a", "1");
        base.insert("b", "2");

        let mut overrides = VariableScope::new();
        overrides.insert("b", "3");

        base.merge(overrides);
        assert_eq!(base.get_string("a").as_deref(), Some("1"));
        assert_eq!(base.get_string("b").as_deref(), Some("3"));
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(
            VariableValue::from_json(&json!("abc")),
            VariableValue::Text("abc".to_string())
        );
        assert_eq!(VariableValue::from_json(&json!(7)).to_string(), "7");
        assert_eq!(
            VariableValue::from_json(&json!(["a", 1])).to_string(),
            r#"["a",1]"#
        );
        assert_eq!(VariableValue::from_json(&json!(true)).to_json(), json!(true));
    }

    #[test]
    fn test_variable_config_parse() {
        let toml_str = r#"
[environments.dev]
api = "http://localhost:3000/api"
pEmail = "loadtest@example.com"

[environments.prod]
api = "https://cal.example.com/api"
pEmail = "${PROD_EMAIL}"
"#;

        let config: VariableConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.environments.len(), 2);

        let dev = config.get_environment("dev").unwrap();
        assert_eq!(
            dev.variables.get("api"),
            Some(&"http://localhost:3000/api".to_string())
        );
    }
}
