// 配置加载：JSON5 / YAML / TOML，支持 ${VAR} 环境变量替换

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;

static ENV_VAR_PATTERN: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// 替换 `${VAR_NAME}` 形式的环境变量，未设置的变量保持原样
pub fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    result
}

/// 从 JSON 字符串解析（支持 JSON5：注释、尾随逗号、未引用的键等）
pub fn from_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    Ok(json5::from_str(&expand_env_vars(json_str))?)
}

/// 从 YAML 字符串解析
pub fn from_yaml<T: DeserializeOwned>(yaml_str: &str) -> Result<T> {
    Ok(serde_yaml::from_str(&expand_env_vars(yaml_str))?)
}

/// 从 TOML 字符串解析
pub fn from_toml<T: DeserializeOwned>(toml_str: &str) -> Result<T> {
    Ok(toml::from_str(&expand_env_vars(toml_str))?)
}

/// 从文件加载，格式由扩展名决定（json / json5 / yaml / yml / toml）
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    let parsed = match extension.as_str() {
        "json" | "json5" => from_json(&content),
        "yaml" | "yml" => from_yaml(&content),
        "toml" => from_toml(&content),
        other => return Err(anyhow!("Unsupported config format: {:?}", other)),
    };

    parsed.with_context(|| format!("Failed to parse config file: {}", path.display()))
}
