//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 条件引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 是否默认记录评估追踪
    pub trace_enabled: bool,
    /// 正则表达式编译缓存的最大条目数，超出后整体清空
    pub regex_cache_capacity: usize,
    /// 字段名找不到时是否按点号路径（如 "user.age"）继续查找
    pub dotted_paths: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trace_enabled: false,
            regex_cache_capacity: 256,
            dotted_paths: true,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，用于标识日志来源
    pub service_name: String,
    pub log_level: String,
    /// 是否启用 JSON 格式日志（否则为人类可读格式）
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "condition-engine".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// 注入服务名
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（CONDITIONS_ 前缀，双下划线分隔层级，
    ///    如 CONDITIONS_ENGINE__REGEX_CACHE_CAPACITY -> engine.regex_cache_capacity）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from_dir(service_name, &config_dir)
    }

    /// 从指定目录加载配置
    pub fn load_from_dir(service_name: &str, config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("CONDITIONS_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = Config::builder()
            // 默认配置
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            // 环境变量覆盖
            .add_source(
                Environment::with_prefix("CONDITIONS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 提取可观测性配置，并注入服务名
    pub fn observability(&self) -> ObservabilityConfig {
        let name = if self.service_name.is_empty() {
            "condition-engine"
        } else {
            &self.service_name
        };
        self.observability.clone().with_service_name(name)
    }
}
