use crate::config::PlatformConfig;
use async_trait::async_trait;
use std::collections::HashMap;

/// 授权方凭据来源（通常是数据库）
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn refresh_token(&self, appid: &str) -> Option<String>;
    async fn verify_ticket(&self) -> Option<String>;

    /// 微信换发了新的 authorizer_refresh_token；默认不保存
    async fn save_refresh_token(&self, _appid: &str, _refresh_token: &str) {}
}

/// 直接从配置读取的凭据
#[derive(Clone, Default)]
pub struct StaticTenantStore {
    verify_ticket: Option<String>,
    refresh_tokens: HashMap<String, String>,
}

impl StaticTenantStore {
    pub fn new(verify_ticket: Option<String>, refresh_tokens: HashMap<String, String>) -> Self {
        Self {
            verify_ticket,
            refresh_tokens,
        }
    }

    pub fn from_config(cfg: &PlatformConfig) -> Self {
        Self::new(cfg.component_verify_ticket.clone(), cfg.authorizers.clone())
    }
}

#[async_trait]
impl TenantStore for StaticTenantStore {
    async fn refresh_token(&self, appid: &str) -> Option<String> {
        self.refresh_tokens
            .get(appid)
            .filter(|t| !t.is_empty())
            .cloned()
    }

    async fn verify_ticket(&self) -> Option<String> {
        self.verify_ticket.clone().filter(|t| !t.is_empty())
    }
}
