pub mod card;
pub mod code;
pub mod component;
pub mod store;

pub use card::{CardApi, StockChange, WechatCardClient};
pub use component::PlatformAuthorizer;
pub use store::{StaticTenantStore, TenantStore};
