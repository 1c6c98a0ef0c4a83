//! Cookie helpers.

use gatehouse_api::{GateError, Result};
use httpdate::fmt_http_date;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// SameSite=Strict
    Strict,
    /// SameSite=Lax
    Lax,
    /// SameSite=None
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes shared by every cookie a [`SessionStore`](crate::SessionStore)
/// writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    /// Cookie path.
    pub path: String,

    /// Optional cookie domain.
    pub domain: Option<String>,

    /// Send on HTTPS only.
    pub secure: bool,

    /// Not accessible to page scripts.
    pub http_only: bool,

    /// SameSite attribute.
    pub same_site: SameSite,

    /// Max-Age in seconds. `None` makes a browser-session cookie.
    pub max_age_seconds: Option<u64>,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
            max_age_seconds: None,
        }
    }
}

// RFC 6265 token characters.
fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        });
    if ok {
        Ok(())
    } else {
        Err(GateError::Cookie(format!("invalid cookie name {name:?}")))
    }
}

// RFC 6265 cookie-octets: no controls, whitespace, DQUOTE, comma, semicolon or backslash.
fn validate_value(name: &str, value: &str) -> Result<()> {
    let ok = value
        .bytes()
        .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E));
    if ok {
        Ok(())
    } else {
        Err(GateError::Cookie(format!(
            "value for cookie {name} contains characters not allowed in a cookie"
        )))
    }
}

fn validate_attributes(attrs: &CookieAttributes) -> Result<()> {
    if !attrs.path.starts_with('/') {
        return Err(GateError::Cookie(format!(
            "cookie path must start with '/', got {:?}",
            attrs.path
        )));
    }
    if attrs.same_site == SameSite::None && !attrs.secure {
        return Err(GateError::Cookie(
            "SameSite=None cookies must be Secure".to_string(),
        ));
    }
    Ok(())
}

fn push_common(parts: &mut Vec<String>, attrs: &CookieAttributes) {
    parts.push(format!("Path={}", attrs.path));

    if let Some(domain) = &attrs.domain {
        parts.push(format!("Domain={domain}"));
    }

    if attrs.secure {
        parts.push("Secure".to_string());
    }
    if attrs.http_only {
        parts.push("HttpOnly".to_string());
    }

    parts.push(format!("SameSite={}", attrs.same_site.as_str()));
}

/// Build a `Set-Cookie` header value.
pub fn build_set_cookie(name: &str, value: &str, attrs: &CookieAttributes) -> Result<String> {
    validate_name(name)?;
    validate_value(name, value)?;
    validate_attributes(attrs)?;

    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("{name}={value}"));
    push_common(&mut parts, attrs);

    if let Some(max_age) = attrs.max_age_seconds {
        parts.push(format!("Max-Age={max_age}"));
        // Expires for older clients.
        let expires = SystemTime::now() + Duration::from_secs(max_age);
        parts.push(format!("Expires={}", fmt_http_date(expires)));
    }

    Ok(parts.join("; "))
}

/// Build a `Set-Cookie` header value that clears the cookie.
pub fn build_clear_cookie(name: &str, attrs: &CookieAttributes) -> Result<String> {
    validate_name(name)?;
    validate_attributes(attrs)?;
    Ok(render_clear_cookie(name, attrs))
}

pub(crate) fn render_clear_cookie(name: &str, attrs: &CookieAttributes) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("{name}="));
    push_common(&mut parts, attrs);
    parts.push("Max-Age=0".to_string());
    parts.push(format!("Expires={}", fmt_http_date(UNIX_EPOCH)));
    parts.join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Change {
    name: String,
    /// `None` once the cookie has been removed.
    value: Option<String>,
    header: String,
}

/// Request cookies plus the `Set-Cookie` changes made while handling the
/// request. Reads observe earlier writes.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    incoming: Vec<(String, String)>,
    changes: Vec<Change>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jar over already-parsed request cookies, in header order. When a name
    /// repeats, the first occurrence wins, as browsers send the most specific
    /// path first.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut incoming: Vec<(String, String)> = Vec::new();
        for (name, value) in pairs {
            let name = name.into();
            if !incoming.iter().any(|(n, _)| *n == name) {
                incoming.push((name, value.into()));
            }
        }
        Self {
            incoming,
            changes: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        match self.changes.iter().find(|c| c.name == name) {
            Some(change) => change.value.as_deref(),
            None => self
                .incoming
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
        }
    }

    /// Record a change whose header was already built and validated.
    pub(crate) fn stage(&mut self, name: &str, value: Option<String>, header: String) {
        let change = Change {
            name: name.to_string(),
            value,
            header,
        };
        match self.changes.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = change,
            None => self.changes.push(change),
        }
    }

    pub fn is_modified(&self) -> bool {
        !self.changes.is_empty()
    }

    /// `Set-Cookie` values to attach to the response, one per changed cookie.
    pub fn set_cookie_headers(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.header.as_str())
    }

    /// The cookies a downstream handler should see: incoming order with
    /// changed values in place, removed cookies dropped and new ones last.
    pub fn effective(&self) -> Vec<(&str, &str)> {
        let mut cookies: Vec<(&str, &str)> = self
            .incoming
            .iter()
            .filter_map(|(name, _)| self.get(name).map(|value| (name.as_str(), value)))
            .collect();
        for change in &self.changes {
            let is_new = !self.incoming.iter().any(|(n, _)| *n == change.name);
            if let (Some(value), true) = (&change.value, is_new) {
                cookies.push((change.name.as_str(), value.as_str()));
            }
        }
        cookies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_has_session_attributes() {
        let attrs = CookieAttributes::default();
        let sc = build_set_cookie("sb-access-token", "abc.def", &attrs).unwrap();
        assert_eq!(
            sc,
            "sb-access-token=abc.def; Path=/; Secure; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn max_age_adds_expires() {
        let attrs = CookieAttributes {
            max_age_seconds: Some(3600),
            domain: Some("example.com".to_string()),
            ..CookieAttributes::default()
        };
        let sc = build_set_cookie("a", "b", &attrs).unwrap();
        assert!(sc.contains("Domain=example.com"));
        assert!(sc.contains("Max-Age=3600"));
        assert!(sc.contains("Expires="));
    }

    #[test]
    fn clear_cookie_has_max_age_zero() {
        let attrs = CookieAttributes::default();
        let sc = build_clear_cookie("sb-refresh-token", &attrs).unwrap();
        assert!(sc.starts_with("sb-refresh-token=; Path=/"));
        assert!(sc.contains("Max-Age=0"));
        assert!(sc.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn rejects_bad_names_values_and_attributes() {
        let attrs = CookieAttributes::default();
        assert!(build_set_cookie("", "v", &attrs).is_err());
        assert!(build_set_cookie("bad name", "v", &attrs).is_err());
        assert!(build_set_cookie("ok", "semi;colon", &attrs).is_err());
        assert!(build_set_cookie("ok", "has space", &attrs).is_err());

        let insecure_none = CookieAttributes {
            secure: false,
            same_site: SameSite::None,
            ..CookieAttributes::default()
        };
        assert!(build_set_cookie("ok", "v", &insecure_none).is_err());

        let relative = CookieAttributes {
            path: "api".to_string(),
            ..CookieAttributes::default()
        };
        assert!(build_clear_cookie("ok", &relative).is_err());
    }

    #[test]
    fn first_occurrence_wins() {
        let jar = CookieJar::from_pairs([("a", "1"), ("b", "two"), ("a", "ignored")]);
        assert_eq!(jar.get("a"), Some("1"));
        assert_eq!(jar.get("b"), Some("two"));
        assert_eq!(jar.get("c"), None);
        assert!(!jar.is_modified());
        assert_eq!(jar.effective(), vec![("a", "1"), ("b", "two")]);
    }

    #[test]
    fn jar_reads_its_own_writes() {
        let attrs = CookieAttributes::default();
        let mut jar = CookieJar::from_pairs([("b", "2"), ("a", "1")]);

        let set_a = build_set_cookie("a", "new", &attrs).unwrap();
        jar.stage("a", Some("new".to_string()), set_a);
        jar.stage("b", None, build_clear_cookie("b", &attrs).unwrap());
        jar.stage("c", Some("3".to_string()), build_set_cookie("c", "3", &attrs).unwrap());
        assert_eq!(jar.get("a"), Some("new"));
        assert_eq!(jar.get("b"), None);
        assert_eq!(jar.effective(), vec![("a", "new"), ("c", "3")]);

        let set_a = build_set_cookie("a", "newer", &attrs).unwrap();
        jar.stage("a", Some("newer".to_string()), set_a);
        let headers: Vec<&str> = jar.set_cookie_headers().collect();
        assert_eq!(headers.len(), 3);
        assert!(headers[0].starts_with("a=newer;"));
        assert!(headers[1].starts_with("b=;"));
    }
}
