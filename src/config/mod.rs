//! 配置管理模块
//!
//! YAML 配置文件 + 环境变量覆盖。配置文件 `docchat.yaml`
//! 约定放在工作目录的上一级（两个后端与前端共用一份），
//! 找不到时使用内置默认值。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SourceType;

/// 开发用默认 key，生产环境必须覆盖
pub const DEFAULT_API_KEY: &str = "docchat-dev-key";

pub fn is_default_api_key(key: &str) -> bool {
    key == DEFAULT_API_KEY
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub pdf_port: u16,
    pub url_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            pdf_port: 8000,
            url_port: 8001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub api_key: String,
    pub pdf_database_path: String,
    pub url_database_path: String,
    pub pdf_api_url: String,
    pub url_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api_key: DEFAULT_API_KEY.to_string(),
            pdf_database_path: "chat_history.db".to_string(),
            url_database_path: "url_chat_history.db".to_string(),
            pdf_api_url: "http://localhost:8000".to_string(),
            url_api_url: "http://localhost:8001".to_string(),
        }
    }
}

impl Config {
    /// 默认配置文件位置：工作目录上一级的 docchat.yaml
    pub fn default_path() -> PathBuf {
        PathBuf::from("..").join("docchat.yaml")
    }

    /// 加载配置：文件（可选）→ 环境变量覆盖
    pub fn load() -> Config {
        let mut config = match Self::from_file(&Self::default_path()) {
            Ok(Some(c)) => c,
            Ok(None) => Config::default(),
            Err(e) => {
                tracing::warn!("[Config] Failed to load config file, using defaults: {}", e);
                Config::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    pub fn from_file(path: &Path) -> Result<Option<Config>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        tracing::info!("[Config] Loaded config from {:?}", path);
        Ok(Some(config))
    }

    fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 5] = [
            ("API_KEY", &mut self.api_key),
            ("PDF_DATABASE_PATH", &mut self.pdf_database_path),
            ("URL_DATABASE_PATH", &mut self.url_database_path),
            ("PDF_API_URL", &mut self.pdf_api_url),
            ("URL_API_URL", &mut self.url_api_url),
        ];
        for (name, slot) in overrides {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    *slot = value;
                }
            }
        }
        if let Ok(host) = std::env::var("DOCCHAT_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = std::env::var("PDF_PORT") {
            if let Ok(port) = port.parse() {
                self.server.pdf_port = port;
            }
        }
        if let Ok(port) = std::env::var("URL_PORT") {
            if let Ok(port) = port.parse() {
                self.server.url_port = port;
            }
        }
    }

    pub fn database_path(&self, kind: SourceType) -> &str {
        match kind {
            SourceType::Pdf => &self.pdf_database_path,
            SourceType::Url => &self.url_database_path,
        }
    }

    pub fn api_url(&self, kind: SourceType) -> &str {
        match kind {
            SourceType::Pdf => &self.pdf_api_url,
            SourceType::Url => &self.url_api_url,
        }
    }

    pub fn port(&self, kind: SourceType) -> u16 {
        match kind {
            SourceType::Pdf => self.server.pdf_port,
            SourceType::Url => self.server.url_port,
        }
    }
}
