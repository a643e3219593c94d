//! Entry point for the `shop-gateway` HTTP server.

use std::time::Duration;

use shop_gateway::{config::Config, routes::create_router, state::AppState, telemetry};
use shop_store::Store;
use tracing::{error, info, warn};

/// How often expired bearer tokens are swept from the database.
const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    telemetry::init(config.log_json);

    let store = match Store::connect(&config.database_url).await {
        Ok(s) => s,
        Err(e) => {
            error!(url = %config.database_url, error = %e, "failed to open store");
            std::process::exit(1);
        }
    };

    if let Some((email, password)) = config.admin_credentials() {
        if let Err(e) = store.ensure_admin(email, password).await {
            error!(error = %e, "failed to bootstrap staff account");
            std::process::exit(1);
        }
    }

    let sweeper = store.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TOKEN_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match sweeper.purge_expired_tokens().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired tokens purged"),
                Err(e) => warn!(error = %e, "token sweep failed"),
            }
        }
    });

    let app = create_router(AppState::new(store, &config));

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %config.listen_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %config.listen_addr, "shop-gateway listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}
