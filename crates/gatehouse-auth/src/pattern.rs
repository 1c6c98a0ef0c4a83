//! Glob route patterns.

use std::collections::BTreeMap;

use gatehouse_api::{GateError, Result, RouteSetName};
use regex::RegexSet;

/// A compiled set of glob patterns.
///
/// `*` matches any run of characters (including none), `?` matches exactly
/// one character, everything else is literal. Every pattern is anchored to
/// the whole path.
#[derive(Debug, Clone)]
pub struct Matcher {
    patterns: Vec<String>,
    set: RegexSet,
}

impl Matcher {
    pub fn compile<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();

        let set = RegexSet::new(patterns.iter().map(|p| glob_to_regex(p))).map_err(|e| {
            GateError::Pattern {
                pattern: patterns.join(", "),
                reason: e.to_string(),
            }
        })?;

        Ok(Self { patterns, set })
    }

    /// A matcher that never matches.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// True if `path` fully matches at least one pattern.
    pub fn test(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

/// Which route sets a path belongs to. The sets are checked independently,
/// so more than one flag may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub protected: bool,
    pub auth_only: bool,
    pub protected_api: bool,
}

impl Classification {
    pub fn contains(self, set: RouteSetName) -> bool {
        match set {
            RouteSetName::Protected => self.protected,
            RouteSetName::AuthOnly => self.auth_only,
            RouteSetName::ProtectedApi => self.protected_api,
        }
    }

    /// The path matched no route set and passes through untouched.
    pub fn is_unclassified(self) -> bool {
        !(self.protected || self.auth_only || self.protected_api)
    }

    pub fn matched(self) -> Vec<RouteSetName> {
        RouteSetName::ALL
            .into_iter()
            .filter(|set| self.contains(*set))
            .collect()
    }
}

/// The three compiled route sets.
#[derive(Debug, Clone)]
pub struct RouteTable {
    protected: Matcher,
    auth_only: Matcher,
    protected_api: Matcher,
}

impl RouteTable {
    /// Compile a mapping from route-set name to patterns. Sets missing from
    /// the mapping never match.
    pub fn compile(sets: &BTreeMap<RouteSetName, Vec<String>>) -> Result<Self> {
        let build = |name: RouteSetName| match sets.get(&name) {
            Some(patterns) => Matcher::compile(patterns),
            None => Ok(Matcher::empty()),
        };

        Ok(Self {
            protected: build(RouteSetName::Protected)?,
            auth_only: build(RouteSetName::AuthOnly)?,
            protected_api: build(RouteSetName::ProtectedApi)?,
        })
    }

    pub fn matcher(&self, set: RouteSetName) -> &Matcher {
        match set {
            RouteSetName::Protected => &self.protected,
            RouteSetName::AuthOnly => &self.auth_only,
            RouteSetName::ProtectedApi => &self.protected_api,
        }
    }

    pub fn classify(&self, path: &str) -> Classification {
        Classification {
            protected: self.protected.test(path),
            auth_only: self.auth_only.test(path),
            protected_api: self.protected_api.test(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_is_exact() {
        let m = Matcher::compile(["/dashboard"]).unwrap();
        assert!(m.test("/dashboard"));
        assert!(!m.test("/dashboard/x"));
        assert!(!m.test("/Dashboard"));
        assert!(!m.test("/dashboard/"));
        assert!(!m.test("x/dashboard"));
    }

    #[test]
    fn star_matches_any_run() {
        let m = Matcher::compile(["/projects/*"]).unwrap();
        assert!(m.test("/projects/"));
        assert!(m.test("/projects/42"));
        assert!(m.test("/projects/42/edit"));
        assert!(!m.test("/projects"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let m = Matcher::compile(["/v?/status"]).unwrap();
        assert!(m.test("/v1/status"));
        assert!(m.test("/v2/status"));
        assert!(!m.test("/v/status"));
        assert!(!m.test("/v10/status"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let m = Matcher::compile(["/a.b+(c)[d]{e}|f^$\\"]).unwrap();
        assert!(m.test("/a.b+(c)[d]{e}|f^$\\"));
        assert!(!m.test("/aXb+(c)[d]{e}|f^$\\"));

        let dots = Matcher::compile(["/file.json"]).unwrap();
        assert!(!dots.test("/fileXjson"));
    }

    #[test]
    fn any_pattern_in_set_matches() {
        let m = Matcher::compile(["/signin", "/register"]).unwrap();
        assert!(m.test("/signin"));
        assert!(m.test("/register"));
        assert!(!m.test("/about"));
    }

    #[test]
    fn empty_set_never_matches() {
        let none: [&str; 0] = [];
        let m = Matcher::compile(none).unwrap();
        assert!(m.is_empty());
        assert!(!m.test(""));
        assert!(!m.test("/"));
        assert!(!Matcher::empty().test("/anything"));
    }

    #[test]
    fn route_table_classifies_independently() {
        let sets = BTreeMap::from([
            (RouteSetName::Protected, vec!["/dashboard".to_string()]),
            (
                RouteSetName::AuthOnly,
                vec!["/signin".to_string(), "/register".to_string()],
            ),
            (RouteSetName::ProtectedApi, vec!["/api/*".to_string()]),
        ]);
        let table = RouteTable::compile(&sets).unwrap();

        let c = table.classify("/dashboard");
        assert!(c.protected && !c.auth_only && !c.protected_api);
        assert_eq!(c.matched(), vec![RouteSetName::Protected]);

        assert!(table.classify("/api/guestbook").protected_api);
        assert!(table.classify("/about").is_unclassified());
    }

    #[test]
    fn missing_sets_compile_empty() {
        let sets = BTreeMap::from([(RouteSetName::AuthOnly, vec!["/signin".to_string()])]);
        let table = RouteTable::compile(&sets).unwrap();
        assert!(table.matcher(RouteSetName::Protected).is_empty());
        assert!(table.classify("/signin").auth_only);
    }
}
