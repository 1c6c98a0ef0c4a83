//! gatehouse-auth
//!
//! Building blocks for gating requests on a provider-backed session:
//!
//! - **Route classification**: glob patterns (`*`, `?`) compiled once into
//!   immutable matchers, grouped into the protected, auth-only and
//!   protected-API route sets
//! - **Cookie handling**: a request/response cookie jar and `Set-Cookie`
//!   builders with `Secure`/`HttpOnly`/`SameSite` attributes
//! - **Session persistence**: the two-cookie access/refresh pair, always
//!   written and cleared together
//! - **Session validation**: a fail-closed wrapper around an
//!   [`IdentityProvider`](gatehouse_api::IdentityProvider) with a bounded
//!   timeout
//!
//! ## Quick start
//! ```
//! use gatehouse_auth::Matcher;
//!
//! let protected = Matcher::compile(["/dashboard", "/projects/*"]).unwrap();
//! assert!(protected.test("/projects/42"));
//! assert!(!protected.test("/dashboard/settings"));
//! ```

#![forbid(unsafe_code)]

mod cookie;
mod pattern;
mod session;
mod validator;

pub use cookie::{CookieAttributes, CookieJar, SameSite, build_clear_cookie, build_set_cookie};
pub use gatehouse_api::{GateError, Result};
pub use pattern::{Classification, Matcher, RouteTable};
pub use session::{DEFAULT_ACCESS_COOKIE, DEFAULT_REFRESH_COOKIE, SessionStore};
pub use validator::{SessionValidator, Validation};
