// SPDX-License-Identifier: AGPL-3.0-or-later

//! QuickCall server: passkey authentication for hosts, ephemeral LiveKit
//! join tokens for guests. All ceremony and session state travels in
//! server-signed cookies, so the process itself is stateless apart from the
//! credential repository.

mod api;
mod config;
mod error;
mod livekit;
mod models;
mod session;
mod state;
mod store;

#[cfg(not(test))]
use std::net::SocketAddr;

#[cfg(not(test))]
use api::router;
#[cfg(not(test))]
use config::Config;
#[cfg(not(test))]
use state::AppState;
#[cfg(not(test))]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(test))]
#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("invalid configuration");
    tracing::info!(
        rp_id = %config.rp_id,
        origin = %config.rp_origin,
        "configuration loaded"
    );
    if config.session_secret.is_none() {
        tracing::warn!("SESSION_SECRET is not set; passkey endpoints will return 500");
    }
    if config.livekit_api_key.is_none() || config.livekit_api_secret.is_none() {
        tracing::warn!("LIVEKIT_API_KEY/LIVEKIT_API_SECRET is not set; /call/token will return 500");
    }

    let state = AppState::new(&config).expect("failed to build application state");
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("failed to parse bind address");

    tracing::info!("QuickCall server listening on http://{addr} (docs at /docs)");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server failed");
}
