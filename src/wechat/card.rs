use crate::errors::CardError;
use crate::utils::{errcode_of, errmsg_of};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::warn;

pub const SHOW_QRCODE_URL: &str = "https://mp.weixin.qq.com/cgi-bin/showqrcode";

/// 库存变更方向，数值保留调用方传入的原值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    Increase(i64),
    Decrease(i64),
}

impl StockChange {
    /// amount 为 0 时按增加库存处理
    pub fn from_amount(amount: i64) -> Self {
        if amount >= 0 {
            StockChange::Increase(amount)
        } else {
            StockChange::Decrease(amount)
        }
    }
}

/// 卡券远程接口，每个方法对应一次远程调用
#[async_trait]
pub trait CardApi: Send + Sync {
    async fn create(&self, card_type: &str, attributes: Map<String, Value>) -> Result<Value, CardError>;
    async fn create_landing_page(
        &self,
        banner: &str,
        page_title: &str,
        can_share: bool,
        scene: &str,
        card_list: Vec<Value>,
    ) -> Result<Value, CardError>;
    async fn colors(&self) -> Result<Value, CardError>;
    async fn set_test_whitelist(&self, openids: Vec<Value>) -> Result<Value, CardError>;
    async fn create_qr_code(&self, cards: Map<String, Value>) -> Result<Value, CardError>;
    async fn qr_code_url(&self, ticket: &str) -> Result<Value, CardError>;
    async fn get(&self, card_id: &str) -> Result<Value, CardError>;
    async fn update(
        &self,
        card_id: &str,
        card_type: &str,
        attributes: Map<String, Value>,
    ) -> Result<Value, CardError>;
    async fn modify_stock(&self, card_id: &str, change: StockChange) -> Result<Value, CardError>;
    async fn delete(&self, card_id: &str) -> Result<Value, CardError>;
    async fn disable_code(&self, code: &str, card_id: &str) -> Result<Value, CardError>;
    async fn get_code(&self, code: &str, card_id: &str, check_consume: bool) -> Result<Value, CardError>;
    async fn consume_code(&self, code: &str, card_id: &str) -> Result<Value, CardError>;
}

/// 以某个授权方 access_token 调用微信卡券接口
pub struct WechatCardClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl WechatCardClient {
    pub fn new(http: Client, base_url: &str, access_token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub(crate) async fn post_json(&self, path: &str, body: &Value) -> Result<Value, CardError> {
        let req = self
            .http
            .post(self.endpoint(path))
            .query(&[("access_token", self.access_token.as_str())])
            .json(body);
        self.send(path, req).await
    }

    pub(crate) async fn get_json(&self, path: &str) -> Result<Value, CardError> {
        let req = self
            .http
            .get(self.endpoint(path))
            .query(&[("access_token", self.access_token.as_str())]);
        self.send(path, req).await
    }

    async fn send(&self, path: &str, req: reqwest::RequestBuilder) -> Result<Value, CardError> {
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            warn!(path, %status, "card api http failure");
            return Err(CardError::remote(format!(
                "HTTP request failed: {} - {}",
                status, text
            )));
        }
        let v: Value = serde_json::from_str(&text)?;
        let errcode = errcode_of(&v);
        if errcode != 0 {
            warn!(path, errcode, errmsg = errmsg_of(&v), "card api returned error");
            return Err(CardError::Remote {
                message: format!("{} errcode {}: {}", path, errcode, errmsg_of(&v)),
                payload: Some(v),
            });
        }
        Ok(v)
    }
}

#[async_trait]
impl CardApi for WechatCardClient {
    async fn create(&self, card_type: &str, attributes: Map<String, Value>) -> Result<Value, CardError> {
        let mut card = Map::new();
        card.insert("card_type".into(), json!(card_type.to_uppercase()));
        card.insert(card_type.to_lowercase(), Value::Object(attributes));
        self.post_json("card/create", &json!({ "card": card })).await
    }

    async fn create_landing_page(
        &self,
        banner: &str,
        page_title: &str,
        can_share: bool,
        scene: &str,
        card_list: Vec<Value>,
    ) -> Result<Value, CardError> {
        let body = json!({
            "banner": banner,
            "page_title": page_title,
            "can_share": can_share,
            "scene": scene,
            "card_list": card_list,
        });
        self.post_json("card/landingpage/create", &body).await
    }

    async fn colors(&self) -> Result<Value, CardError> {
        self.get_json("card/getcolors").await
    }

    async fn set_test_whitelist(&self, openids: Vec<Value>) -> Result<Value, CardError> {
        self.post_json("card/testwhitelist/set", &json!({ "openid": openids }))
            .await
    }

    async fn create_qr_code(&self, cards: Map<String, Value>) -> Result<Value, CardError> {
        self.post_json("card/qrcode/create", &Value::Object(cards)).await
    }

    async fn qr_code_url(&self, ticket: &str) -> Result<Value, CardError> {
        Ok(Value::String(format!(
            "{}?ticket={}",
            SHOW_QRCODE_URL,
            urlencoding::encode(ticket)
        )))
    }

    async fn get(&self, card_id: &str) -> Result<Value, CardError> {
        self.post_json("card/get", &json!({ "card_id": card_id })).await
    }

    async fn update(
        &self,
        card_id: &str,
        card_type: &str,
        attributes: Map<String, Value>,
    ) -> Result<Value, CardError> {
        let mut body = Map::new();
        body.insert("card_id".into(), json!(card_id));
        body.insert(card_type.to_lowercase(), Value::Object(attributes));
        self.post_json("card/update", &Value::Object(body)).await
    }

    async fn modify_stock(&self, card_id: &str, change: StockChange) -> Result<Value, CardError> {
        // 微信只接受正数，方向由字段名决定
        let (key, amount) = match change {
            StockChange::Increase(n) => ("increase_stock_value", n.unsigned_abs()),
            StockChange::Decrease(n) => ("reduce_stock_value", n.unsigned_abs()),
        };
        let mut body = Map::new();
        body.insert("card_id".into(), json!(card_id));
        body.insert(key.into(), json!(amount));
        self.post_json("card/modifystock", &Value::Object(body)).await
    }

    async fn delete(&self, card_id: &str) -> Result<Value, CardError> {
        self.post_json("card/delete", &json!({ "card_id": card_id })).await
    }

    async fn disable_code(&self, code: &str, card_id: &str) -> Result<Value, CardError> {
        self.code_unavailable(code, card_id).await
    }

    async fn get_code(&self, code: &str, card_id: &str, check_consume: bool) -> Result<Value, CardError> {
        self.code_get(code, card_id, check_consume).await
    }

    async fn consume_code(&self, code: &str, card_id: &str) -> Result<Value, CardError> {
        self.code_consume(code, card_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::StockChange;

    #[test]
    fn stock_change_selects_direction_by_sign() {
        assert_eq!(StockChange::from_amount(5), StockChange::Increase(5));
        assert_eq!(StockChange::from_amount(-3), StockChange::Decrease(-3));
        assert_eq!(StockChange::from_amount(0), StockChange::Increase(0));
    }
}
