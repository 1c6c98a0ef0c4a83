use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gatehouse_api::{GateError, ProviderConfig, Result, RouteSetName};
use gatehouse_auth::{CookieAttributes, RouteTable, SameSite, SessionStore};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "gatehouse.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub upstream: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            upstream: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteConfig {
    pub protected: Vec<String>,
    #[serde(alias = "authOnly")]
    pub auth_only: Vec<String>,
    #[serde(alias = "protectedApi")]
    pub protected_api: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            protected: vec!["/dashboard".to_string()],
            auth_only: vec!["/signin".to_string(), "/register".to_string()],
            protected_api: vec!["/api/guestbook".to_string()],
        }
    }
}

impl RouteConfig {
    pub fn to_sets(&self) -> BTreeMap<RouteSetName, Vec<String>> {
        BTreeMap::from([
            (RouteSetName::Protected, self.protected.clone()),
            (RouteSetName::AuthOnly, self.auth_only.clone()),
            (RouteSetName::ProtectedApi, self.protected_api.clone()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedirectConfig {
    pub sign_in: String,
    pub dashboard: String,
    pub after_login: String,
    /// Absolute URL an OAuth provider sends the browser back to; it should
    /// point at the callback endpoint.
    pub oauth_return_to: String,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            sign_in: "/signin".to_string(),
            dashboard: "/dashboard".to_string(),
            after_login: "/".to_string(),
            oauth_return_to: "http://127.0.0.1:8080/api/auth/callback".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CookieConfig {
    pub access_name: String,
    pub refresh_name: String,
    pub http_only: bool,
    pub secure: bool,
    pub domain: Option<String>,
    pub max_age_seconds: Option<u64>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            access_name: gatehouse_auth::DEFAULT_ACCESS_COOKIE.to_string(),
            refresh_name: gatehouse_auth::DEFAULT_REFRESH_COOKIE.to_string(),
            http_only: true,
            secure: true,
            domain: None,
            max_age_seconds: None,
        }
    }
}

impl CookieConfig {
    /// Session cookies are always `Path=/` and `SameSite=Strict`.
    pub fn attributes(&self) -> CookieAttributes {
        CookieAttributes {
            path: "/".to_string(),
            domain: self.domain.clone(),
            secure: self.secure,
            http_only: self.http_only,
            same_site: SameSite::Strict,
            max_age_seconds: self.max_age_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub signin: String,
    pub callback: String,
    pub signout: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            signin: "/api/auth/signin".to_string(),
            callback: "/api/auth/callback".to_string(),
            signout: "/api/auth/signout".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub routes: RouteConfig,
    pub redirects: RedirectConfig,
    pub cookies: CookieConfig,
    pub endpoints: EndpointConfig,
}

impl GateConfig {
    pub fn route_table(&self) -> Result<RouteTable> {
        RouteTable::compile(&self.routes.to_sets())
    }

    pub fn session_store(&self) -> Result<SessionStore> {
        SessionStore::new(
            self.cookies.access_name.clone(),
            self.cookies.refresh_name.clone(),
            self.cookies.attributes(),
        )
    }
}

fn require_absolute_path(what: &str, value: &str) -> Result<()> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(GateError::Config(format!(
            "{what} must be an absolute path, got {value:?}"
        )))
    }
}

fn require_http_url(what: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(GateError::Config(format!(
            "{what} must be an http(s) URL, got {value:?}"
        )))
    }
}

pub fn validate_config(config: &GateConfig) -> Result<()> {
    require_http_url("provider.url", &config.provider.url)?;
    if config.provider.timeout_ms == 0 {
        return Err(GateError::Config(
            "provider.timeout_ms must be greater than zero".to_string(),
        ));
    }
    if let Some(upstream) = &config.server.upstream {
        require_http_url("server.upstream", upstream)?;
    }

    let redirects = &config.redirects;
    require_absolute_path("redirects.sign_in", &redirects.sign_in)?;
    require_absolute_path("redirects.dashboard", &redirects.dashboard)?;
    require_absolute_path("redirects.after_login", &redirects.after_login)?;
    require_http_url("redirects.oauth_return_to", &redirects.oauth_return_to)?;

    let endpoints = &config.endpoints;
    let mounted = [&endpoints.signin, &endpoints.callback, &endpoints.signout];
    for (name, path) in ["signin", "callback", "signout"].into_iter().zip(mounted) {
        require_absolute_path(&format!("endpoints.{name}"), path)?;
    }
    if mounted[0] == mounted[1] || mounted[0] == mounted[2] || mounted[1] == mounted[2] {
        return Err(GateError::Config(
            "endpoints.signin, endpoints.callback and endpoints.signout must differ".to_string(),
        ));
    }

    config.session_store()?;
    let table = config.route_table()?;

    // Redirect targets must not bounce straight back through the gate.
    let sign_in = table.classify(&redirects.sign_in);
    if sign_in.protected || sign_in.protected_api {
        return Err(GateError::Config(format!(
            "sign-in redirect {} requires a session itself",
            redirects.sign_in
        )));
    }
    if table.classify(&redirects.dashboard).auth_only {
        return Err(GateError::Config(format!(
            "dashboard redirect {} is an auth-only route",
            redirects.dashboard
        )));
    }
    for endpoint in mounted {
        let class = table.classify(endpoint);
        if class.protected || class.protected_api {
            return Err(GateError::Config(format!(
                "endpoint {endpoint} must be reachable without a session"
            )));
        }
    }

    Ok(())
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("gatehouse")
    } else {
        PathBuf::from(".gatehouse")
    }
}

pub fn load_config_from_dir(dir: &Path) -> Result<GateConfig> {
    load_config_from_file(&dir.join(CONFIG_FILE_NAME))
}

pub fn load_config_from_file(path: &Path) -> Result<GateConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| GateError::Config(format!("failed to read {}: {e}", path.display())))?;
    let config: GateConfig = toml::from_str(&content).map_err(|e| {
        GateError::Config(format!("invalid TOML in {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../../docs/gatehouse/gatehouse.toml.example");

pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}

/// Write the default configuration to `path`, leaving an existing file alone
/// unless `force` is set. Returns whether the file was written.
pub fn write_default_config_file(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            GateError::Internal(format!("failed to create {}: {e}", dir.display()))
        })?;
    }
    fs::write(path, DEFAULT_CONFIG_TOML)
        .map_err(|e| GateError::Internal(format!("failed to write {}: {e}", path.display())))?;
    Ok(true)
}
