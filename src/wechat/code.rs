use crate::errors::CardError;
use crate::wechat::card::WechatCardClient;
use serde_json::{json, Value};

// 卡券 code 相关接口
impl WechatCardClient {
    /// 设置 code 失效
    pub async fn code_unavailable(&self, code: &str, card_id: &str) -> Result<Value, CardError> {
        self.post_json(
            "card/code/unavailable",
            &json!({ "code": code, "card_id": card_id }),
        )
        .await
    }

    pub async fn code_get(
        &self,
        code: &str,
        card_id: &str,
        check_consume: bool,
    ) -> Result<Value, CardError> {
        self.post_json(
            "card/code/get",
            &json!({ "code": code, "card_id": card_id, "check_consume": check_consume }),
        )
        .await
    }

    /// 核销 code
    pub async fn code_consume(&self, code: &str, card_id: &str) -> Result<Value, CardError> {
        self.post_json(
            "card/code/consume",
            &json!({ "code": code, "card_id": card_id }),
        )
        .await
    }
}
