use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

pub type UserId = String;

/// The access/refresh token pair carried by the two session cookies.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl SessionTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Both halves are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

// Token values must never reach the logs.
impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
}

/// A session the identity provider accepted, with the pair to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSession {
    pub tokens: SessionTokens,
    pub identity: Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSetName {
    Protected,
    #[serde(alias = "authOnly")]
    AuthOnly,
    #[serde(alias = "protectedApi")]
    ProtectedApi,
}

impl RouteSetName {
    pub const ALL: [RouteSetName; 3] = [
        RouteSetName::Protected,
        RouteSetName::AuthOnly,
        RouteSetName::ProtectedApi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RouteSetName::Protected => "protected",
            RouteSetName::AuthOnly => "auth_only",
            RouteSetName::ProtectedApi => "protected_api",
        }
    }
}

impl fmt::Display for RouteSetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub url: String,
    /// Name of the secret holding the provider's public API key.
    pub anon_key_ref: String,
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:54321".to_string(),
            anon_key_ref: "SUPABASE_ANON_KEY".to_string(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid route pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("cookie error: {0}")]
    Cookie(String),
    #[error("secret error: {0}")]
    Secret(String),
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GateError>;

/// External collaborator that mints and refreshes sessions.
///
/// Implementations report every failure (rejected tokens, transport errors,
/// malformed responses) as an `Err`; callers treat all of them alike.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Validate a token pair, refreshing it when needed. The returned pair
    /// may differ from the input and supersedes it.
    fn set_session(
        &self,
        tokens: &SessionTokens,
    ) -> impl Future<Output = Result<ValidatedSession>> + Send;

    /// Trade a one-time authorization code for a fresh token pair.
    fn exchange_code_for_session(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<SessionTokens>> + Send;

    /// Email a one-time sign-in link, creating the user if needed.
    fn sign_in_with_otp(&self, email: &str) -> impl Future<Output = Result<()>> + Send {
        let _ = email;
        async { Err(GateError::Provider("email sign-in is not supported".to_string())) }
    }

    /// Where to send the browser to sign in with an external OAuth provider.
    /// The provider returns to `redirect_to` with a one-time code.
    fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String> {
        let _ = redirect_to;
        Err(GateError::Provider(format!(
            "OAuth sign-in with {provider} is not supported"
        )))
    }
}

pub trait SecretStore: Send + Sync {
    fn get(&self, secret_ref: &str) -> Result<String>;
}
