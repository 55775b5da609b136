use config::{Config as ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::CardError;

pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// 卡券路由前缀
    #[serde(default = "ApiConfig::default_prefix")]
    pub prefix: String,
}

impl ApiConfig {
    fn default_prefix() -> String {
        "/wechat/card".to_string()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
        }
    }
}

/// 开放平台第三方组件配置
#[derive(Clone, Deserialize)]
pub struct PlatformConfig {
    pub component_appid: String,
    pub component_secret: String,
    /// 微信每 10 分钟推送一次的 component_verify_ticket
    #[serde(default)]
    pub component_verify_ticket: Option<String>,
    #[serde(default = "PlatformConfig::default_api_base")]
    pub api_base: String,
    /// 授权方 appid -> authorizer_refresh_token
    #[serde(default)]
    pub authorizers: HashMap<String, String>,
}

impl PlatformConfig {
    fn default_api_base() -> String {
        DEFAULT_API_BASE.to_string()
    }
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("component_appid", &self.component_appid)
            .field("api_base", &self.api_base)
            .field("authorizers", &self.authorizers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub platform: PlatformConfig,
}

impl AppConfig {
    /// 读取 config.toml（可选）并叠加 APP_ 前缀的环境变量，如 APP_PLATFORM__COMPONENT_APPID
    pub fn load(path: &str) -> Result<Self, CardError> {
        let cfg: AppConfig = ConfigBuilder::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CardError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CardError> {
        if self.platform.component_appid.trim().is_empty() {
            return Err(CardError::Config("platform.component_appid is empty".into()));
        }
        if self.platform.component_secret.trim().is_empty() {
            return Err(CardError::Config("platform.component_secret is empty".into()));
        }
        url::Url::parse(&self.platform.api_base)
            .map_err(|e| CardError::Config(format!("platform.api_base: {}", e)))?;
        let prefix = &self.api.prefix;
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            return Err(CardError::Config(format!(
                "api.prefix `{}` must look like `/segment`",
                prefix
            )));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            api: ApiConfig::default(),
            platform: PlatformConfig {
                component_appid: "wx_component".into(),
                component_secret: "secret".into(),
                component_verify_ticket: Some("ticket@@@x".into()),
                api_base: DEFAULT_API_BASE.into(),
                authorizers: HashMap::new(),
            },
        }
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = sample();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.api.prefix, "/wechat/card");
    }

    #[test]
    fn rejects_bad_api_base() {
        let mut cfg = sample();
        cfg.platform.api_base = "not a url".into();
        assert!(matches!(cfg.validate(), Err(CardError::Config(_))));
    }

    #[test]
    fn rejects_root_prefix() {
        let mut cfg = sample();
        cfg.api.prefix = "/".into();
        assert!(cfg.validate().is_err());
        cfg.api.prefix = "/wechat/card/".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_component_secret() {
        let mut cfg = sample();
        cfg.platform.component_secret = " ".into();
        assert!(matches!(cfg.validate(), Err(CardError::Config(_))));
    }

    #[test]
    fn debug_hides_secrets() {
        let mut cfg = sample();
        cfg.platform
            .authorizers
            .insert("wx_tenant".into(), "refresh@@@token".into());
        let s = format!("{:?}", cfg.platform);
        assert!(!s.contains("component_secret"));
        assert!(!s.contains("refresh@@@token"));
        assert!(s.contains("wx_tenant"));
    }
}
