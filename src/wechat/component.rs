use crate::client::{AuthorizedClient, Authorizer};
use crate::config::PlatformConfig;
use crate::errors::CardError;
use crate::utils::{errcode_of, errmsg_of, now};
use crate::wechat::card::WechatCardClient;
use crate::wechat::store::TenantStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

/// token 提前失效的秒数
const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: OffsetDateTime,
}

/// 通过开放平台第三方组件为授权方换取 access_token
pub struct PlatformAuthorizer {
    component_appid: String,
    component_secret: String,
    api_base: String,
    http: Client,
    store: Arc<dyn TenantStore>,
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl PlatformAuthorizer {
    pub fn new(cfg: &PlatformConfig, http: Client, store: Arc<dyn TenantStore>) -> Self {
        Self {
            component_appid: cfg.component_appid.clone(),
            component_secret: cfg.component_secret.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            http,
            store,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &str) -> Option<String> {
        let m = self.tokens.lock().ok()?;
        let token = m
            .get(key)
            .filter(|t| t.expires_at > now())
            .map(|t| t.token.clone());
        token
    }

    fn remember(&self, key: String, token: String, expires_in: i64) {
        let ttl = expires_in - EXPIRY_MARGIN_SECS;
        if ttl <= 0 {
            return;
        }
        if let Ok(mut m) = self.tokens.lock() {
            m.insert(
                key,
                CachedToken {
                    token,
                    expires_at: now() + Duration::seconds(ttl),
                },
            );
        }
    }

    async fn post_component(
        &self,
        path: &str,
        query: Option<(&str, &str)>,
        body: &Value,
    ) -> Result<Value, CardError> {
        let mut req = self.http.post(format!("{}/{}", self.api_base, path));
        if let Some(q) = query {
            req = req.query(&[q]);
        }
        let resp = req
            .json(body)
            .send()
            .await
            .map_err(|e| CardError::Authorization(format!("{}: {}", path, e)))?;
        let v: Value = resp
            .json()
            .await
            .map_err(|e| CardError::Authorization(format!("{}: {}", path, e)))?;
        let errcode = errcode_of(&v);
        if errcode != 0 {
            return Err(CardError::Authorization(format!(
                "{} errcode {}: {}",
                path,
                errcode,
                errmsg_of(&v)
            )));
        }
        Ok(v)
    }

    pub async fn component_access_token(&self) -> Result<String, CardError> {
        let key = format!("component:{}", self.component_appid);
        if let Some(token) = self.cached(&key) {
            return Ok(token);
        }
        let ticket = self.store.verify_ticket().await.ok_or_else(|| {
            CardError::Authorization("component_verify_ticket not available".to_string())
        })?;
        let body = json!({
            "component_appid": self.component_appid,
            "component_appsecret": self.component_secret,
            "component_verify_ticket": ticket,
        });
        let v = self
            .post_component("cgi-bin/component/api_component_token", None, &body)
            .await?;
        let (token, expires_in) = token_field(&v, "component_access_token")?;
        debug!(component_appid = %self.component_appid, expires_in, "component token refreshed");
        self.remember(key, token.clone(), expires_in);
        Ok(token)
    }

    pub async fn authorizer_access_token(&self, appid: &str) -> Result<String, CardError> {
        let key = format!("authorizer:{}", appid);
        if let Some(token) = self.cached(&key) {
            return Ok(token);
        }
        let refresh_token = self
            .store
            .refresh_token(appid)
            .await
            .ok_or_else(|| CardError::Authorization(format!("unknown authorizer appid {}", appid)))?;
        let component_token = self.component_access_token().await?;
        let body = json!({
            "component_appid": self.component_appid,
            "authorizer_appid": appid,
            "authorizer_refresh_token": refresh_token,
        });
        let v = self
            .post_component(
                "cgi-bin/component/api_authorizer_token",
                Some(("component_access_token", component_token.as_str())),
                &body,
            )
            .await?;
        let (token, expires_in) = token_field(&v, "authorizer_access_token")?;
        if let Some(rotated) = v.get("authorizer_refresh_token").and_then(|r| r.as_str()) {
            if !rotated.is_empty() && rotated != refresh_token {
                warn!(appid, "authorizer_refresh_token rotated by wechat");
                self.store.save_refresh_token(appid, rotated).await;
            }
        }
        debug!(appid, expires_in, "authorizer token refreshed");
        self.remember(key, token.clone(), expires_in);
        Ok(token)
    }
}

fn token_field(v: &Value, field: &str) -> Result<(String, i64), CardError> {
    let token = v
        .get(field)
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CardError::Authorization(format!("response missing {}", field)))?;
    let expires_in = v.get("expires_in").and_then(|e| e.as_i64()).unwrap_or(0);
    Ok((token.to_string(), expires_in))
}

#[async_trait]
impl Authorizer for PlatformAuthorizer {
    async fn resolve(&self, appid: &str) -> Result<AuthorizedClient, CardError> {
        let token = self.authorizer_access_token(appid).await?;
        let card = WechatCardClient::new(self.http.clone(), &self.api_base, token);
        Ok(AuthorizedClient::new(appid, Box::new(card)))
    }
}
