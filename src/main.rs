use std::sync::Arc;

use rust_card_wf::config::AppConfig;
use rust_card_wf::utils::http_client;
use rust_card_wf::wechat::{PlatformAuthorizer, StaticTenantStore};
use rust_card_wf::create_card_router;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config".to_string());
    let cfg = AppConfig::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Arc::new(StaticTenantStore::from_config(&cfg.platform));
    let authorizer = Arc::new(PlatformAuthorizer::new(&cfg.platform, http_client()?, store));
    let app = create_card_router(authorizer, &cfg.api.prefix);

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        %addr,
        prefix = %cfg.api.prefix,
        component_appid = %cfg.platform.component_appid,
        authorizers = cfg.platform.authorizers.len(),
        "card service listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
