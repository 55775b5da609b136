use crate::errors::CardError;
use crate::wechat::card::CardApi;
use async_trait::async_trait;

/// 单次请求内使用的授权客户端，按值传入处理函数后即被消耗
pub struct AuthorizedClient {
    appid: String,
    card: Box<dyn CardApi>,
}

impl AuthorizedClient {
    pub fn new(appid: impl Into<String>, card: Box<dyn CardApi>) -> Self {
        Self {
            appid: appid.into(),
            card,
        }
    }

    pub fn appid(&self) -> &str {
        &self.appid
    }

    pub fn card(&self) -> &dyn CardApi {
        self.card.as_ref()
    }
}

/// 按授权方 appid 解析出可调用卡券接口的客户端
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn resolve(&self, appid: &str) -> Result<AuthorizedClient, CardError>;
}
