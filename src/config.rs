//! 配置模块，负责从JSON文件加载schema、binding配置和过滤查询

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::ast::FilterQuery;
use crate::binding::{Backend, BindingConfig, TableSession};
use crate::expression::Bindings;
use crate::filters::FilterRegistry;
use crate::schema::{Entity, Schema};

/// 配置错误
#[derive(Debug, thiserror::Error)]
#[error("configuration error: {message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 读取并解析JSON文件
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    // 检查文件是否存在
    if !path.exists() {
        return Err(ConfigError::new(format!(
            "config file does not exist: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::new(format!("cannot read config file {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        ConfigError::new(format!("cannot parse JSON file {}: {}", path.display(), e))
    })
}

/// schema文件: `{"entities": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl SchemaFile {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }

    /// 检查关系目标都存在于schema中
    pub fn into_schema(self) -> Result<Schema, ConfigError> {
        let schema = Schema::from_entities(self.entities);
        for entity in schema.entities() {
            for relationship in &entity.relationships {
                if schema.get(&relationship.target).is_none() {
                    return Err(ConfigError::new(format!(
                        "relationship '{}' of entity '{}' targets unknown entity '{}'",
                        relationship.name, entity.name, relationship.target
                    )));
                }
            }
        }
        Ok(schema)
    }
}

/// binding文件:
///
/// ```json
/// {
///   "for": "User",
///   "backend": "sqlite",
///   "binding": {"name": "name", "mail": {"param": "mail", "join": "email"}},
///   "filters": ["eq", "like"],
///   "default_filter": "eq"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingFile {
    #[serde(rename = "for", default)]
    pub model: Option<String>,
    #[serde(default)]
    pub binding: Bindings,
    /// 允许的过滤器名称，缺省为全部内置过滤器
    #[serde(default)]
    pub filters: Option<Vec<String>>,
    #[serde(default)]
    pub default_filter: Option<String>,
    /// 设置后使用按表查询的session
    #[serde(default)]
    pub backend: Option<Backend>,
}

impl BindingFile {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }

    pub fn into_config(self) -> Result<BindingConfig, ConfigError> {
        let mut config = BindingConfig {
            model: self.model,
            binding: self.binding,
            default_filter: self.default_filter,
            ..BindingConfig::default()
        };

        if let Some(names) = self.filters {
            let mut registry = FilterRegistry::default();
            // 默认过滤器可能不在内置默认值"eq"上
            if let Some(default) = &config.default_filter {
                registry = registry
                    .with_default(default)
                    .map_err(|e| ConfigError::new(e.to_string()))?;
            }
            let subset = registry
                .subset(&names)
                .map_err(|e| ConfigError::new(e.to_string()))?;
            config.filters = Some(subset);
        }

        if let Some(backend) = self.backend {
            config.session = Some(Arc::new(TableSession::new(backend)));
        }

        Ok(config)
    }
}

pub fn load_schema<P: AsRef<Path>>(path: P) -> Result<Schema, ConfigError> {
    SchemaFile::from_json_file(path)?.into_schema()
}

pub fn load_binding<P: AsRef<Path>>(path: P) -> Result<BindingConfig, ConfigError> {
    BindingFile::from_json_file(path)?.into_config()
}

pub fn load_query<P: AsRef<Path>>(path: P) -> Result<FilterQuery, ConfigError> {
    read_json(path.as_ref())
}
