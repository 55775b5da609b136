//! 卡券接口的处理函数
//!
//! 每个操作都遵循同样的流程：先从请求中取出参数并校验，
//! 再按 appid 解析授权客户端，最后调用一次远程接口并原样返回结果。
//! 参数校验失败时不会解析授权，也不会发出任何远程调用。

use crate::client::{AuthorizedClient, Authorizer};
use crate::errors::CardError;
use crate::wechat::card::StockChange;
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    CreateLandingPage,
    GetColors,
    SetTestWhitelist,
    GenerateQrCode,
    ExchangeQrTicket,
    GetInfo,
    Update,
    UpdateQuantity,
    Disable,
    Delete,
    GetCode,
    ConsumeCode,
}

impl OperationKind {
    pub const ALL: [OperationKind; 13] = [
        OperationKind::Create,
        OperationKind::CreateLandingPage,
        OperationKind::GetColors,
        OperationKind::SetTestWhitelist,
        OperationKind::GenerateQrCode,
        OperationKind::ExchangeQrTicket,
        OperationKind::GetInfo,
        OperationKind::Update,
        OperationKind::UpdateQuantity,
        OperationKind::Disable,
        OperationKind::Delete,
        OperationKind::GetCode,
        OperationKind::ConsumeCode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::CreateLandingPage => "createLandingPage",
            OperationKind::GetColors => "getColors",
            OperationKind::SetTestWhitelist => "setTestWhitelist",
            OperationKind::GenerateQrCode => "generateQRCode",
            OperationKind::ExchangeQrTicket => "exchangeQRTicket",
            OperationKind::GetInfo => "getInfo",
            OperationKind::Update => "update",
            OperationKind::UpdateQuantity => "updateQuantity",
            OperationKind::Disable => "disable",
            OperationKind::Delete => "delete",
            OperationKind::GetCode => "getCode",
            OperationKind::ConsumeCode => "consumeCode",
        }
    }

    /// 路由路径片段
    pub fn segment(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::CreateLandingPage => "landing-page",
            OperationKind::GetColors => "colors",
            OperationKind::SetTestWhitelist => "test-whitelist",
            OperationKind::GenerateQrCode => "qrcode",
            OperationKind::ExchangeQrTicket => "qrcode-url",
            OperationKind::GetInfo => "info",
            OperationKind::Update => "update",
            OperationKind::UpdateQuantity => "quantity",
            OperationKind::Disable => "disable",
            OperationKind::Delete => "delete",
            OperationKind::GetCode => "code",
            OperationKind::ConsumeCode => "consume",
        }
    }
}

/// 校验后的操作参数
#[derive(Debug, Clone, PartialEq)]
pub enum CardOperation {
    Create {
        card_type: String,
        attributes: Map<String, Value>,
    },
    CreateLandingPage {
        banner: String,
        page_title: String,
        can_share: bool,
        scene: String,
        card_list: Vec<Value>,
    },
    GetColors,
    SetTestWhitelist {
        openids: Vec<Value>,
    },
    GenerateQrCode {
        cards: Map<String, Value>,
    },
    ExchangeQrTicket {
        ticket: String,
    },
    GetInfo {
        card_id: String,
    },
    Update {
        card_id: String,
        card_type: String,
        attributes: Map<String, Value>,
    },
    UpdateQuantity {
        card_id: String,
        change: StockChange,
    },
    Disable {
        code: String,
        card_id: String,
    },
    Delete {
        card_id: String,
    },
    GetCode {
        code: String,
        card_id: String,
    },
    ConsumeCode {
        code: String,
        card_id: String,
    },
}

fn field<'a>(data: &'a Map<String, Value>, name: &str) -> Result<&'a Value, CardError> {
    match data.get(name) {
        None | Some(Value::Null) => Err(CardError::missing(name)),
        Some(v) => Ok(v),
    }
}

fn invalid(name: &str, expected: &str) -> CardError {
    CardError::Validation(format!("field `{}` must be {}", name, expected))
}

fn str_field(data: &Map<String, Value>, name: &str) -> Result<String, CardError> {
    field(data, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(name, "a string"))
}

fn object_field(data: &Map<String, Value>, name: &str) -> Result<Map<String, Value>, CardError> {
    field(data, name)?
        .as_object()
        .cloned()
        .ok_or_else(|| invalid(name, "an object"))
}

fn array_field(data: &Map<String, Value>, name: &str) -> Result<Vec<Value>, CardError> {
    field(data, name)?
        .as_array()
        .cloned()
        .ok_or_else(|| invalid(name, "an array"))
}

/// 合并 base_info 与类型专属字段（especial），后者同名键覆盖前者
pub fn merge_attributes(data: &Map<String, Value>) -> Result<Map<String, Value>, CardError> {
    let base_info = object_field(data, "base_info")?;
    let mut attributes = Map::new();
    attributes.insert("base_info".to_string(), Value::Object(base_info));
    match data.get("especial") {
        None | Some(Value::Null) => {}
        Some(Value::Object(especial)) => {
            for (k, v) in especial {
                attributes.insert(k.clone(), v.clone());
            }
        }
        Some(_) => return Err(invalid("especial", "an object")),
    }
    Ok(attributes)
}

impl CardOperation {
    /// 从请求体解析操作参数，缺失或类型不符的字段返回 Validation
    pub fn parse(kind: OperationKind, payload: &Value) -> Result<Self, CardError> {
        let data = payload
            .as_object()
            .ok_or_else(|| CardError::Validation("request body must be a JSON object".into()))?;
        let op = match kind {
            OperationKind::Create => CardOperation::Create {
                card_type: str_field(data, "type")?,
                attributes: merge_attributes(data)?,
            },
            OperationKind::CreateLandingPage => {
                let can_share = field(data, "can_share")?
                    .as_bool()
                    .ok_or_else(|| invalid("can_share", "a boolean"))?;
                CardOperation::CreateLandingPage {
                    banner: str_field(data, "banner")?,
                    page_title: str_field(data, "page_title")?,
                    can_share,
                    scene: str_field(data, "scene")?,
                    card_list: array_field(data, "card_list")?,
                }
            }
            OperationKind::GetColors => CardOperation::GetColors,
            OperationKind::SetTestWhitelist => CardOperation::SetTestWhitelist {
                openids: array_field(data, "openids")?,
            },
            OperationKind::GenerateQrCode => CardOperation::GenerateQrCode {
                cards: object_field(data, "cards")?,
            },
            OperationKind::ExchangeQrTicket => CardOperation::ExchangeQrTicket {
                ticket: str_field(data, "ticket")?,
            },
            OperationKind::GetInfo => CardOperation::GetInfo {
                card_id: str_field(data, "card_id")?,
            },
            OperationKind::Update => CardOperation::Update {
                card_id: str_field(data, "card_id")?,
                card_type: str_field(data, "type")?.to_lowercase(),
                attributes: merge_attributes(data)?,
            },
            OperationKind::UpdateQuantity => {
                let amount = field(data, "amount")?
                    .as_i64()
                    .ok_or_else(|| invalid("amount", "an integer"))?;
                CardOperation::UpdateQuantity {
                    card_id: str_field(data, "card_id")?,
                    change: StockChange::from_amount(amount),
                }
            }
            OperationKind::Disable => CardOperation::Disable {
                code: str_field(data, "code")?,
                card_id: str_field(data, "card_id")?,
            },
            OperationKind::Delete => CardOperation::Delete {
                card_id: str_field(data, "card_id")?,
            },
            OperationKind::GetCode => CardOperation::GetCode {
                code: str_field(data, "code")?,
                card_id: str_field(data, "card_id")?,
            },
            OperationKind::ConsumeCode => CardOperation::ConsumeCode {
                code: str_field(data, "code")?,
                card_id: str_field(data, "card_id")?,
            },
        };
        Ok(op)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            CardOperation::Create { .. } => OperationKind::Create,
            CardOperation::CreateLandingPage { .. } => OperationKind::CreateLandingPage,
            CardOperation::GetColors => OperationKind::GetColors,
            CardOperation::SetTestWhitelist { .. } => OperationKind::SetTestWhitelist,
            CardOperation::GenerateQrCode { .. } => OperationKind::GenerateQrCode,
            CardOperation::ExchangeQrTicket { .. } => OperationKind::ExchangeQrTicket,
            CardOperation::GetInfo { .. } => OperationKind::GetInfo,
            CardOperation::Update { .. } => OperationKind::Update,
            CardOperation::UpdateQuantity { .. } => OperationKind::UpdateQuantity,
            CardOperation::Disable { .. } => OperationKind::Disable,
            CardOperation::Delete { .. } => OperationKind::Delete,
            CardOperation::GetCode { .. } => OperationKind::GetCode,
            CardOperation::ConsumeCode { .. } => OperationKind::ConsumeCode,
        }
    }

    /// 使用授权客户端执行一次远程调用，客户端随之被消耗
    pub async fn execute(self, client: AuthorizedClient) -> Result<Value, CardError> {
        let card = client.card();
        match self {
            CardOperation::Create {
                card_type,
                attributes,
            } => card.create(&card_type, attributes).await,
            CardOperation::CreateLandingPage {
                banner,
                page_title,
                can_share,
                scene,
                card_list,
            } => {
                card.create_landing_page(&banner, &page_title, can_share, &scene, card_list)
                    .await
            }
            CardOperation::GetColors => card.colors().await,
            CardOperation::SetTestWhitelist { openids } => card.set_test_whitelist(openids).await,
            CardOperation::GenerateQrCode { cards } => card.create_qr_code(cards).await,
            CardOperation::ExchangeQrTicket { ticket } => card.qr_code_url(&ticket).await,
            CardOperation::GetInfo { card_id } => card.get(&card_id).await,
            CardOperation::Update {
                card_id,
                card_type,
                attributes,
            } => card.update(&card_id, &card_type, attributes).await,
            CardOperation::UpdateQuantity { card_id, change } => {
                card.modify_stock(&card_id, change).await
            }
            CardOperation::Disable { code, card_id } => card.disable_code(&code, &card_id).await,
            CardOperation::Delete { card_id } => card.delete(&card_id).await,
            CardOperation::GetCode { code, card_id } => card.get_code(&code, &card_id, false).await,
            CardOperation::ConsumeCode { code, card_id } => {
                card.consume_code(&code, &card_id).await
            }
        }
    }
}

/// 取请求的 appid：优先 query 参数，其次请求体中的 appid 字段
pub fn tenant_id(query: Option<&str>, payload: &Value) -> Result<String, CardError> {
    query
        .or_else(|| payload.get("appid").and_then(|a| a.as_str()))
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CardError::missing("appid"))
}

/// 校验、解析授权、执行一次远程调用
pub async fn dispatch(
    authorizer: &dyn Authorizer,
    kind: OperationKind,
    query_appid: Option<&str>,
    payload: &Value,
) -> Result<Value, CardError> {
    let appid = tenant_id(query_appid, payload)?;
    let op = CardOperation::parse(kind, payload)?;
    debug!(appid = %appid, operation = kind.name(), "dispatching card operation");

    let client = authorizer.resolve(&appid).await.map_err(|e| {
        warn!(appid = %appid, error = %e, "authorizer resolve failed");
        e
    })?;
    op.execute(client).await.map_err(|e| {
        warn!(appid = %appid, operation = kind.name(), error = %e, "card operation failed");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attributes_without_especial_is_base_info_only() {
        let data = json!({"type": "GROUPON", "base_info": {"title": "t"}});
        let attrs = merge_attributes(data.as_object().unwrap()).unwrap();
        assert_eq!(Value::Object(attrs), json!({"base_info": {"title": "t"}}));
    }

    #[test]
    fn attributes_merge_especial_flat() {
        let data = json!({
            "base_info": {"title": "t"},
            "especial": {"deal_detail": "d", "advanced_info": {"abstract": {}}}
        });
        let attrs = merge_attributes(data.as_object().unwrap()).unwrap();
        assert_eq!(
            Value::Object(attrs),
            json!({"base_info": {"title": "t"}, "deal_detail": "d", "advanced_info": {"abstract": {}}})
        );
    }

    #[test]
    fn especial_base_info_overrides() {
        let data = json!({"base_info": {"title": "a"}, "especial": {"base_info": {"title": "b"}}});
        let attrs = merge_attributes(data.as_object().unwrap()).unwrap();
        assert_eq!(attrs["base_info"], json!({"title": "b"}));
    }

    #[test]
    fn update_lowercases_type() {
        let op = CardOperation::parse(
            OperationKind::Update,
            &json!({"card_id": "p1", "type": "COUPON", "base_info": {}}),
        )
        .unwrap();
        match op {
            CardOperation::Update { card_type, .. } => assert_eq!(card_type, "coupon"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn create_keeps_type_as_given() {
        let op = CardOperation::parse(
            OperationKind::Create,
            &json!({"type": "Cash", "base_info": {}}),
        )
        .unwrap();
        assert!(matches!(op, CardOperation::Create { ref card_type, .. } if card_type == "Cash"));
    }

    #[test]
    fn quantity_sign_selects_variant() {
        let parse = |amount: Value| {
            CardOperation::parse(
                OperationKind::UpdateQuantity,
                &json!({"card_id": "p1", "amount": amount}),
            )
        };
        assert!(matches!(
            parse(json!(5)).unwrap(),
            CardOperation::UpdateQuantity { change: StockChange::Increase(5), .. }
        ));
        assert!(matches!(
            parse(json!(-3)).unwrap(),
            CardOperation::UpdateQuantity { change: StockChange::Decrease(-3), .. }
        ));
        assert!(matches!(
            parse(json!(0)).unwrap(),
            CardOperation::UpdateQuantity { change: StockChange::Increase(0), .. }
        ));
        assert!(matches!(parse(json!("5")), Err(CardError::Validation(_))));
        assert!(matches!(parse(json!(1.5)), Err(CardError::Validation(_))));
    }

    #[test]
    fn every_kind_roundtrips_through_parse() {
        let full = json!({
            "type": "GENERAL_COUPON",
            "base_info": {},
            "banner": "http://b",
            "page_title": "p",
            "can_share": true,
            "scene": "SCENE_H5",
            "card_list": [],
            "openids": ["o1"],
            "cards": {"action_name": "QR_CARD"},
            "ticket": "tk",
            "card_id": "p1",
            "amount": 1,
            "code": "123",
        });
        for kind in OperationKind::ALL {
            let op = CardOperation::parse(kind, &full).unwrap();
            assert_eq!(op.kind(), kind);
        }
    }

    #[test]
    fn missing_fields_fail_validation() {
        let cases = [
            (OperationKind::Create, json!({"base_info": {}})),
            (OperationKind::Create, json!({"type": "GROUPON"})),
            (OperationKind::CreateLandingPage, json!({"banner": "b", "page_title": "p", "can_share": true, "scene": "s"})),
            (OperationKind::SetTestWhitelist, json!({})),
            (OperationKind::GenerateQrCode, json!({})),
            (OperationKind::ExchangeQrTicket, json!({})),
            (OperationKind::GetInfo, json!({"card_id": null})),
            (OperationKind::Update, json!({"type": "x", "base_info": {}})),
            (OperationKind::UpdateQuantity, json!({"card_id": "p1"})),
            (OperationKind::Disable, json!({"card_id": "p1"})),
            (OperationKind::Delete, json!({})),
            (OperationKind::GetCode, json!({"code": "c"})),
            (OperationKind::ConsumeCode, json!({"card_id": "p1"})),
        ];
        for (kind, payload) in cases {
            assert!(
                matches!(CardOperation::parse(kind, &payload), Err(CardError::Validation(_))),
                "{} should fail with {}",
                kind.name(),
                payload
            );
        }
    }

    #[test]
    fn get_colors_needs_no_fields() {
        assert_eq!(
            CardOperation::parse(OperationKind::GetColors, &json!({})).unwrap(),
            CardOperation::GetColors
        );
        assert!(CardOperation::parse(OperationKind::GetColors, &json!([])).is_err());
    }

    #[test]
    fn tenant_id_prefers_query() {
        let body = json!({"appid": "wx_body"});
        assert_eq!(tenant_id(Some("wx_query"), &body).unwrap(), "wx_query");
        assert_eq!(tenant_id(None, &body).unwrap(), "wx_body");
        assert!(matches!(tenant_id(Some("  "), &json!({})), Err(CardError::Validation(_))));
        assert!(matches!(tenant_id(None, &json!({})), Err(CardError::Validation(_))));
    }
}
