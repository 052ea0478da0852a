use crate::Result;
use crate::variable::resolver::VariableResolver;
use crate::variable::types::{VariableConfig, VariableScope};
use std::fs;
use std::path::{Path, PathBuf};

/// 环境配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    pub const CONFIG_FILE: &'static str = "ruscenario.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<VariableConfig> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及父目录
    /// 2. 用户配置目录 ~/.config/ruscenario/
    pub fn find_and_load() -> Option<VariableConfig> {
        let path = Self::find_config_path()?;
        match Self::load_from_path(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded environment config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                None
            }
        }
    }

    fn find_config_path() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }

        let user_path = dirs::home_dir()?
            .join(".config")
            .join("ruscenario")
            .join(Self::CONFIG_FILE);
        user_path.exists().then_some(user_path)
    }

    /// 构建初始变量作用域
    /// env_name: 环境名称（如 "dev", "prod"）
    /// cli_vars: CLI 传入的变量覆盖（--var key=value）
    pub fn build_context(
        config: &VariableConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> VariableScope {
        let mut scope = VariableScope::new();

        // 1. 从配置文件加载环境变量
        if let Some(name) = env_name {
            match config.get_environment(name) {
                Some(env) => {
                    for (key, value) in &env.variables {
                        // 解析系统环境变量 ${VAR}
                        scope.insert(key.clone(), VariableResolver::resolve_env_vars(value));
                    }
                }
                None => tracing::warn!(environment = name, "Environment not found in config"),
            }
        }

        // 2. 应用 CLI 覆盖（优先级最高）
        for (key, value) in cli_vars {
            scope.insert(key.clone(), value.clone());
        }

        scope
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
    }
}
