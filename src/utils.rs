use once_cell::sync::OnceCell;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use time::OffsetDateTime;

use crate::errors::CardError;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// 全局复用的 HTTP Client（30s 超时）
pub fn http_client() -> Result<Client, CardError> {
    CLIENT
        .get_or_try_init(|| {
            Client::builder()
                .user_agent("rust_card_wf")
                .timeout(Duration::from_secs(30))
                .build()
        })
        .cloned()
        .map_err(|e| CardError::Config(format!("init http client: {}", e)))
}

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// 微信接口以 errcode 表示业务失败；缺省或为 0 视为成功
pub fn errcode_of(v: &Value) -> i64 {
    v.get("errcode").and_then(|c| c.as_i64()).unwrap_or(0)
}

pub fn errmsg_of(v: &Value) -> &str {
    v.get("errmsg").and_then(|m| m.as_str()).unwrap_or("")
}
