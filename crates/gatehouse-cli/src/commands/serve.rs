use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use gatehouse_api::IdentityProvider;
use gatehouse_connectors::{EnvSecretStore, SupabaseProvider};
use gatehouse_core::GateConfig;
use gatehouse_http::{SharedGate, auth_router, protect};
use gatehouse_runtime::RequestGate;
use tower_http::trace::TraceLayer;

use super::proxy::{SharedUpstream, Upstream, forward};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// The gated reverse proxy: auth endpoints plus a fallback that forwards
/// everything else upstream, all behind the gate.
pub fn app<P: IdentityProvider>(
    gate: SharedGate<P>,
    config: &GateConfig,
    upstream: SharedUpstream,
) -> Router {
    let router = Router::new()
        .fallback(forward)
        .with_state(upstream)
        .merge(auth_router(gate.clone(), &config.endpoints));
    protect(router, gate).layer(TraceLayer::new_for_http())
}

pub async fn cmd_serve(config: GateConfig) -> anyhow::Result<()> {
    let upstream_url = config
        .server
        .upstream
        .clone()
        .context("[server] upstream is not set; nothing to proxy to")?;

    let provider = SupabaseProvider::from_config(&config.provider, &EnvSecretStore)
        .context("configuring identity provider")?;
    let gate = Arc::new(RequestGate::from_config(&config, provider)?);
    let upstream = Arc::new(Upstream::new(&upstream_url, UPSTREAM_TIMEOUT)?);

    let app = app(gate, &config, upstream);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    tracing::info!(
        bind = %config.server.bind,
        upstream = %upstream_url,
        provider = %config.provider.url,
        "gatehouse listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
