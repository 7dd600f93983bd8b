//! 统一配置中心
//!
//! 提供服务的全局配置，包括：
//! - HTTP 服务监听地址
//! - 存储后端（内存或 PostgreSQL）
//! - 心跳超时清理任务的周期与阈值
//!
//! 加载顺序：默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> 环境变量（`APP_*`，
//! 嵌套字段用 `__` 分隔，例如 `APP_REAPER__TIMEOUT_SECONDS=30`）。

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub database_url: Option<String>,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

/// 心跳超时清理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReaperConfig {
    #[validate(range(min = 1))]
    pub interval_seconds: u64,
    #[validate(range(min = 1))]
    pub timeout_seconds: u64,
}

/// 全局应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub storage: StorageConfig,
    #[validate(nested)]
    pub reaper: ReaperConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 5000,
                cors_origins: vec!["*".into()],
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: None,
                max_connections: 5,
            },
            reaper: ReaperConfig {
                interval_seconds: 15,
                timeout_seconds: 10,
            },
        }
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("invalid storage configuration: {0}")]
    InvalidStorage(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

impl AppConfig {
    /// 按默认值、配置文件、环境变量的优先级合并
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        let cfg: AppConfig = Self::figment().extract()?;
        cfg.check()?;
        Ok(cfg)
    }

    /// 从 TOML/YAML/JSON 字符串解析，按内容粗略判断格式
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = if s.trim_start().starts_with('{') {
            serde_json::from_str(s).map_err(|err| ConfigError::Parse(err.to_string()))?
        } else if s.contains('[') || s.contains('=') {
            toml::from_str(s).map_err(|err| ConfigError::Parse(err.to_string()))?
        } else {
            serde_yaml::from_str(s).map_err(|err| ConfigError::Parse(err.to_string()))?
        };
        cfg.check()?;
        Ok(cfg)
    }

    /// 字段校验加跨字段约束
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        if self.storage.backend == StorageBackend::Postgres {
            let url = self.storage.database_url.as_deref().unwrap_or_default();
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(ConfigError::InvalidStorage(
                    "postgres backend requires a postgres:// database_url".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 用于日志输出，隐藏数据库连接串
    pub fn sanitize(&self) -> String {
        let mut redacted = self.clone();
        if redacted.storage.database_url.is_some() {
            redacted.storage.database_url = Some("postgres://[REDACTED]".to_string());
        }
        format!("{:?}", redacted)
    }
}
