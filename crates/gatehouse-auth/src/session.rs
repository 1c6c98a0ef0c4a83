//! The two-cookie session representation.

use gatehouse_api::{GateError, Result, SessionTokens};

use crate::cookie::{
    CookieAttributes, CookieJar, build_clear_cookie, build_set_cookie, render_clear_cookie,
};

pub const DEFAULT_ACCESS_COOKIE: &str = "sb-access-token";
pub const DEFAULT_REFRESH_COOKIE: &str = "sb-refresh-token";

/// Reads and writes the access/refresh cookie pair.
///
/// The same attributes are used for sessions issued by the credential
/// exchange and for sessions refreshed in flight.
#[derive(Debug, Clone)]
pub struct SessionStore {
    access_name: String,
    refresh_name: String,
    attrs: CookieAttributes,
    clear_headers: [String; 2],
}

impl SessionStore {
    pub fn new(
        access_name: impl Into<String>,
        refresh_name: impl Into<String>,
        attrs: CookieAttributes,
    ) -> Result<Self> {
        let access_name = access_name.into();
        let refresh_name = refresh_name.into();
        if access_name == refresh_name {
            return Err(GateError::Cookie(format!(
                "access and refresh cookies share the name {access_name}"
            )));
        }

        // Also validates both names and the attributes up front.
        let clear_headers = [
            build_clear_cookie(&access_name, &attrs)?,
            build_clear_cookie(&refresh_name, &attrs)?,
        ];

        Ok(Self {
            access_name,
            refresh_name,
            attrs,
            clear_headers,
        })
    }

    /// The session, if both cookies are present and non-empty.
    pub fn read(&self, jar: &CookieJar) -> Option<SessionTokens> {
        let access = jar.get(&self.access_name).filter(|v| !v.is_empty())?;
        let refresh = jar.get(&self.refresh_name).filter(|v| !v.is_empty())?;
        Some(SessionTokens::new(access, refresh))
    }

    /// Set both cookies. On error the jar is left unchanged.
    pub fn write(&self, jar: &mut CookieJar, tokens: &SessionTokens) -> Result<()> {
        let access = build_set_cookie(&self.access_name, &tokens.access_token, &self.attrs)?;
        let refresh = build_set_cookie(&self.refresh_name, &tokens.refresh_token, &self.attrs)?;

        jar.stage(&self.access_name, Some(tokens.access_token.clone()), access);
        jar.stage(&self.refresh_name, Some(tokens.refresh_token.clone()), refresh);
        Ok(())
    }

    /// Delete both cookies.
    pub fn clear(&self, jar: &mut CookieJar) {
        let [access, refresh] = self.clear_headers.clone();
        jar.stage(&self.access_name, None, access);
        jar.stage(&self.refresh_name, None, refresh);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        let attrs = CookieAttributes::default();
        Self {
            clear_headers: [
                render_clear_cookie(DEFAULT_ACCESS_COOKIE, &attrs),
                render_clear_cookie(DEFAULT_REFRESH_COOKIE, &attrs),
            ],
            access_name: DEFAULT_ACCESS_COOKIE.to_string(),
            refresh_name: DEFAULT_REFRESH_COOKIE.to_string(),
            attrs,
        }
    }
}
