use std::time::Duration;

use gatehouse_api::{Identity, IdentityProvider, Result, ValidatedSession};
use gatehouse_auth::{CookieJar, RouteTable, SessionStore, SessionValidator, Validation};
use gatehouse_core::{GateConfig, RedirectConfig, validate_config};

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Hand the request to the downstream handler.
    Continue,
    /// Browser navigation that must go elsewhere.
    Redirect { location: String },
    /// API call without a usable session: 401 with a JSON error body.
    Unauthorized,
}

/// Session status as seen by the gate for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// One or both cookies absent.
    Missing,
    /// The provider rejected the pair or could not be reached.
    Invalid,
    Valid(ValidatedSession),
}

/// Per-request state the gate reads and mutates.
#[derive(Debug, Clone)]
pub struct RequestContext {
    path: String,
    cookies: CookieJar,
    identity: Option<Identity>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>, cookies: CookieJar) -> Self {
        Self {
            path: path.into(),
            cookies,
            identity: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// The authenticated identity, once a protected check has passed.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn into_parts(self) -> (CookieJar, Option<Identity>) {
        (self.cookies, self.identity)
    }
}

/// Classifies request paths and enforces the session policy of each route
/// set before a request reaches its handler.
///
/// The protected-page, auth-only and protected-API checks run in that order
/// and independently of each other; the first terminal outcome wins. A
/// request triggers at most one provider round trip.
#[derive(Debug)]
pub struct RequestGate<P> {
    routes: RouteTable,
    store: SessionStore,
    validator: SessionValidator<P>,
    redirects: RedirectConfig,
}

impl<P: IdentityProvider> RequestGate<P> {
    pub fn new(
        routes: RouteTable,
        store: SessionStore,
        validator: SessionValidator<P>,
        redirects: RedirectConfig,
    ) -> Self {
        Self {
            routes,
            store,
            validator,
            redirects,
        }
    }

    pub fn from_config(config: &GateConfig, provider: P) -> Result<Self> {
        validate_config(config)?;
        let validator = SessionValidator::new(provider)
            .with_timeout(Duration::from_millis(config.provider.timeout_ms));
        Ok(Self::new(
            config.route_table()?,
            config.session_store()?,
            validator,
            config.redirects.clone(),
        ))
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn validator(&self) -> &SessionValidator<P> {
        &self.validator
    }

    pub fn redirects(&self) -> &RedirectConfig {
        &self.redirects
    }

    pub async fn evaluate(&self, ctx: &mut RequestContext) -> GateOutcome {
        let class = self.routes.classify(&ctx.path);
        if class.is_unclassified() {
            tracing::trace!(path = %ctx.path, "path matches no route set");
            return GateOutcome::Continue;
        }
        tracing::debug!(path = %ctx.path, sets = ?class.matched(), "classified request");

        let mut cached = None;

        if class.protected {
            match self.session_state(&ctx.cookies, &mut cached).await {
                SessionState::Missing => {
                    tracing::info!(path = %ctx.path, "no session for protected page");
                    return redirect_to(&self.redirects.sign_in);
                }
                SessionState::Invalid => {
                    tracing::info!(path = %ctx.path, "invalid session for protected page");
                    self.store.clear(&mut ctx.cookies);
                    return redirect_to(&self.redirects.sign_in);
                }
                SessionState::Valid(session) => {
                    if !self.persist(ctx, session) {
                        return redirect_to(&self.redirects.sign_in);
                    }
                }
            }
        }

        if class.auth_only {
            match self.session_state(&ctx.cookies, &mut cached).await {
                SessionState::Missing => {}
                SessionState::Invalid => {
                    // Let the sign-in page render, minus the stale cookies.
                    self.store.clear(&mut ctx.cookies);
                }
                SessionState::Valid(session) => {
                    if self.persist(ctx, session) {
                        tracing::info!(path = %ctx.path, "signed-in user sent away from auth page");
                        return redirect_to(&self.redirects.dashboard);
                    }
                }
            }
        }

        if class.protected_api {
            match self.session_state(&ctx.cookies, &mut cached).await {
                SessionState::Missing => {
                    tracing::info!(path = %ctx.path, "no session for protected API");
                    return GateOutcome::Unauthorized;
                }
                SessionState::Invalid => {
                    tracing::info!(path = %ctx.path, "invalid session for protected API");
                    self.store.clear(&mut ctx.cookies);
                    return GateOutcome::Unauthorized;
                }
                SessionState::Valid(session) => {
                    if !self.persist(ctx, session) {
                        return GateOutcome::Unauthorized;
                    }
                }
            }
        }

        GateOutcome::Continue
    }

    async fn session_state(
        &self,
        cookies: &CookieJar,
        cached: &mut Option<SessionState>,
    ) -> SessionState {
        if let Some(state) = cached {
            return state.clone();
        }

        let state = match self.store.read(cookies) {
            None => SessionState::Missing,
            Some(tokens) => match self.validator.refresh(&tokens).await {
                Validation::Valid(session) => SessionState::Valid(session),
                Validation::Invalid => SessionState::Invalid,
            },
        };
        *cached = Some(state.clone());
        state
    }

    /// Store the refreshed pair and expose the identity. A pair that cannot
    /// be stored counts as invalid.
    fn persist(&self, ctx: &mut RequestContext, session: ValidatedSession) -> bool {
        match self.store.write(&mut ctx.cookies, &session.tokens) {
            Ok(()) => {
                ctx.identity = Some(session.identity);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "refreshed session could not be stored");
                self.store.clear(&mut ctx.cookies);
                false
            }
        }
    }
}

fn redirect_to(location: &str) -> GateOutcome {
    GateOutcome::Redirect {
        location: location.to_string(),
    }
}
