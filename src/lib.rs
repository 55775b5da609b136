pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod server;
pub mod utils;
pub mod wechat;

pub use client::{AuthorizedClient, Authorizer};
pub use errors::CardError;
pub use handlers::{CardOperation, OperationKind};
pub use server::create_card_router;
