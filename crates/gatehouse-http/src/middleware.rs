use std::borrow::Cow;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::Cookie;
use gatehouse_api::IdentityProvider;
use gatehouse_auth::CookieJar;
use gatehouse_runtime::{GateOutcome, RequestContext};

use crate::SharedGate;

/// The JSON body sent to API callers without a usable session.
pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Unauthorized" })),
    )
        .into_response()
}

/// Parse the request's `Cookie` headers, keeping their order.
pub fn request_cookies(headers: &HeaderMap) -> CookieJar {
    CookieJar::from_pairs(
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(std::result::Result::ok)
            .map(|c| (c.name().to_string(), c.value_trimmed().to_string())),
    )
}

/// Append the jar's `Set-Cookie` values to a response.
pub fn apply_cookies(jar: &CookieJar, headers: &mut HeaderMap) {
    for cookie in jar.set_cookie_headers() {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => tracing::error!(error = %err, "dropping unencodable Set-Cookie header"),
        }
    }
}

// Downstream handlers see the cookies as the gate left them.
fn rewrite_cookie_header(jar: &CookieJar, headers: &mut HeaderMap) {
    if !jar.is_modified() {
        return;
    }
    headers.remove(COOKIE);
    let cookie = jar
        .effective()
        .into_iter()
        .map(|(name, value)| Cookie::new(name, value).to_string())
        .collect::<Vec<_>>()
        .join("; ");
    if cookie.is_empty() {
        return;
    }
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.insert(COOKIE, value);
        }
        Err(err) => tracing::error!(error = %err, "dropping unencodable Cookie header"),
    }
}

/// The path the application will route on: percent-decoded, as upstream
/// frameworks decode it before matching. `None` if it is not UTF-8.
fn routing_path(uri: &Uri) -> Option<String> {
    urlencoding::decode(uri.path()).ok().map(Cow::into_owned)
}

pub async fn gate_middleware<P: IdentityProvider>(
    State(gate): State<SharedGate<P>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(path) = routing_path(request.uri()) else {
        tracing::warn!(uri = %request.uri(), "rejecting path that does not decode to UTF-8");
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    };
    let mut ctx = RequestContext::new(path, request_cookies(request.headers()));
    let outcome = gate.evaluate(&mut ctx).await;
    let (jar, identity) = ctx.into_parts();

    let mut response = match outcome {
        GateOutcome::Continue => {
            rewrite_cookie_header(&jar, request.headers_mut());
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
        GateOutcome::Redirect { location } => Redirect::to(&location).into_response(),
        GateOutcome::Unauthorized => unauthorized(),
    };

    apply_cookies(&jar, response.headers_mut());
    response
}
