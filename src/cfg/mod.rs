//! cfg 模块 - 配置加载
//!
//! 从 JSON5 / YAML / TOML 文件或字符串加载配置，支持 `${VAR}` 环境变量替换。

mod loader;

pub use loader::{expand_env_vars, from_json, from_toml, from_yaml, load_config};
