use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::client::Authorizer;
use crate::errors::CardError;
use crate::handlers::{dispatch, OperationKind};

#[derive(Clone)]
pub struct CardState {
    pub authorizer: Arc<dyn Authorizer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    pub appid: Option<String>,
}

/// 空请求体视为 `{}`
fn parse_body(body: &Bytes) -> Result<Value, CardError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body)
        .map_err(|e| CardError::Validation(format!("invalid JSON body: {}", e)))
}

async fn handle(
    kind: OperationKind,
    state: CardState,
    query: Result<Query<TenantQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<Value>, CardError> {
    let Query(query) =
        query.map_err(|e| CardError::Validation(format!("invalid query: {}", e.body_text())))?;
    let payload = parse_body(&body)?;
    let result = dispatch(
        state.authorizer.as_ref(),
        kind,
        query.appid.as_deref(),
        &payload,
    )
    .await?;
    Ok(Json(result))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 每个卡券操作一个 POST 路由，挂在 prefix 下
pub fn create_card_router(authorizer: Arc<dyn Authorizer>, prefix: &str) -> Router {
    let mut card_routes = Router::<CardState>::new();
    for kind in OperationKind::ALL {
        card_routes = card_routes.route(
            &format!("/{}", kind.segment()),
            post(
                move |State(state): State<CardState>,
                      query: Result<Query<TenantQuery>, QueryRejection>,
                      body: Bytes| async move { handle(kind, state, query, body).await },
            ),
        );
    }
    Router::new()
        .nest(prefix, card_routes)
        .route("/health", get(health_check))
        .with_state(CardState { authorizer })
}
