//! gatehouse-http
//!
//! Runs the [`RequestGate`](gatehouse_runtime::RequestGate) as axum
//! middleware and mounts the endpoints that start, create and destroy the
//! session cookie pair.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{Router, routing::get};
//! use gatehouse_connectors::{EnvSecretStore, SupabaseProvider};
//! use gatehouse_core::GateConfig;
//! use gatehouse_runtime::RequestGate;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GateConfig::default();
//! let provider = SupabaseProvider::from_config(&config.provider, &EnvSecretStore)?;
//! let gate = Arc::new(RequestGate::from_config(&config, provider)?);
//!
//! let app = Router::new()
//!     .route("/dashboard", get(|| async { "dashboard" }))
//!     .merge(gatehouse_http::auth_router(gate.clone(), &config.endpoints));
//! let app = gatehouse_http::protect(app, gate);
//! # let _ = app;
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod handlers;
mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use gatehouse_api::IdentityProvider;
use gatehouse_core::EndpointConfig;
use gatehouse_runtime::RequestGate;

pub use handlers::{CallbackParams, SignInForm, auth_callback, sign_in, sign_out};
pub use middleware::{apply_cookies, gate_middleware, request_cookies, unauthorized};

pub type SharedGate<P> = Arc<RequestGate<P>>;

/// Routes for sign-in, the credential-exchange callback and sign-out.
pub fn auth_router<P: IdentityProvider>(gate: SharedGate<P>, endpoints: &EndpointConfig) -> Router {
    Router::new()
        .route(&endpoints.signin, post(sign_in::<P>))
        .route(&endpoints.callback, get(auth_callback::<P>))
        .route(&endpoints.signout, get(sign_out::<P>).post(sign_out::<P>))
        .with_state(gate)
}

/// Put every route of `router`, and its fallback, behind the gate.
pub fn protect<P: IdentityProvider>(router: Router, gate: SharedGate<P>) -> Router {
    router.layer(axum::middleware::from_fn_with_state(
        gate,
        gate_middleware::<P>,
    ))
}
