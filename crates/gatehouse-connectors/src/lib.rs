use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use gatehouse_api::{
    GateError, Identity, IdentityProvider, ProviderConfig, Result, SecretStore, SessionTokens,
    ValidatedSession,
};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;

pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, secret_ref: &str) -> Result<String> {
        std::env::var(secret_ref)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GateError::Secret(format!("missing secret env var {secret_ref}")))
    }
}

/// Secrets held in memory, for embedding and tests.
#[derive(Default)]
pub struct StaticSecretStore {
    secrets: BTreeMap<String, String>,
}

impl StaticSecretStore {
    pub fn new<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets: secrets
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl SecretStore for StaticSecretStore {
    fn get(&self, secret_ref: &str) -> Result<String> {
        self.secrets
            .get(secret_ref)
            .cloned()
            .ok_or_else(|| GateError::Secret(format!("unknown secret {secret_ref}")))
    }
}

// ─── Supabase auth (GoTrue) ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthTokenResponse {
    access_token: String,
    refresh_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

impl AuthUser {
    fn into_identity(self) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.filter(|e| !e.is_empty()),
        }
    }
}

/// [`IdentityProvider`] backed by a Supabase project's auth API.
#[derive(Clone)]
pub struct SupabaseProvider {
    url: String,
    anon_key: String,
    http: Client,
}

impl fmt::Debug for SupabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseProvider")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl SupabaseProvider {
    pub fn new(
        url: impl Into<String>,
        anon_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GateError::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            http,
        })
    }

    pub fn from_config(cfg: &ProviderConfig, secrets: &dyn SecretStore) -> Result<Self> {
        let anon_key = secrets.get(&cfg.anon_key_ref)?;
        Self::new(
            cfg.url.clone(),
            anon_key,
            Duration::from_millis(cfg.timeout_ms),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The user owning `access_token`, or `None` if the token is rejected.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        let url = format!("{}/auth/v1/user", self.url);
        let resp = self
            .http
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        match resp.status() {
            s if s.is_success() => Ok(Some(resp.json().await.map_err(transport_error)?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => Err(failure("get user", resp).await),
        }
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: &serde_json::Value,
    ) -> Result<AuthTokenResponse> {
        let url = format!("{}/auth/v1/token", self.url);
        let resp = self
            .http
            .post(&url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        if resp.status().is_success() {
            resp.json().await.map_err(transport_error)
        } else {
            Err(failure(grant_type, resp).await)
        }
    }
}

impl IdentityProvider for SupabaseProvider {
    async fn set_session(&self, tokens: &SessionTokens) -> Result<ValidatedSession> {
        if let Some(user) = self.get_user(&tokens.access_token).await? {
            return Ok(ValidatedSession {
                tokens: tokens.clone(),
                identity: user.into_identity(),
            });
        }

        tracing::debug!("access token rejected, refreshing session");
        let fresh = self
            .token_grant(
                "refresh_token",
                &serde_json::json!({ "refresh_token": tokens.refresh_token }),
            )
            .await?;
        Ok(ValidatedSession {
            tokens: SessionTokens::new(fresh.access_token, fresh.refresh_token),
            identity: fresh.user.into_identity(),
        })
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<SessionTokens> {
        let fresh = self
            .token_grant("pkce", &serde_json::json!({ "auth_code": code }))
            .await?;
        Ok(SessionTokens::new(fresh.access_token, fresh.refresh_token))
    }

    async fn sign_in_with_otp(&self, email: &str) -> Result<()> {
        let url = format!("{}/auth/v1/otp", self.url);
        let resp = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "create_user": true }))
            .send()
            .await
            .map_err(transport_error)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(failure("otp", resp).await)
        }
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/auth/v1/authorize", self.url),
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
        .map_err(|e| GateError::Config(format!("invalid provider url {}: {e}", self.url)))?;
        Ok(url.into())
    }
}

fn transport_error(e: reqwest::Error) -> GateError {
    GateError::Provider(e.to_string())
}

async fn failure(operation: &str, resp: Response) -> GateError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    GateError::Provider(format!("{operation} failed ({status}): {body}"))
}
