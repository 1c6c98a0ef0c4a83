use std::sync::Arc;
use std::time::Duration;

use axum::Extension;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use gatehouse_api::Identity;

pub const USER_ID_HEADER: &str = "x-gatehouse-user-id";
pub const USER_EMAIL_HEADER: &str = "x-gatehouse-user-email";

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards requests that passed the gate to the upstream application.
#[derive(Debug, Clone)]
pub struct Upstream {
    base: String,
    http: reqwest::Client,
}

pub type SharedUpstream = Arc<Upstream>;

impl Upstream {
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn target(&self, uri: &Uri) -> String {
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("{}{path}", self.base)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove(header::CONTENT_LENGTH);
}

/// Request headers for the upstream: hop-by-hop and client-supplied identity
/// headers removed, identity of the gated session added.
fn upstream_headers(mut headers: HeaderMap, identity: Option<&Identity>) -> HeaderMap {
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(USER_ID_HEADER);
    headers.remove(USER_EMAIL_HEADER);

    if let Some(identity) = identity {
        if let Ok(value) = HeaderValue::from_str(&identity.user_id) {
            headers.insert(USER_ID_HEADER, value);
        }
        if let Some(Ok(value)) = identity.email.as_deref().map(HeaderValue::from_str) {
            headers.insert(USER_EMAIL_HEADER, value);
        }
    }
    headers
}

pub async fn forward(
    State(upstream): State<SharedUpstream>,
    identity: Option<Extension<Identity>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let target = upstream.target(&parts.uri);

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "request body rejected");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };
    let identity = identity.map(|Extension(identity)| identity);

    let result = upstream
        .http
        .request(parts.method.clone(), &target)
        .headers(upstream_headers(parts.headers, identity.as_ref()))
        .body(body)
        .send()
        .await;

    let resp = match result {
        Ok(resp) => resp,
        Err(err) => {
            tracing::error!(error = %err, method = %parts.method, %target, "upstream request failed");
            return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
        }
    };

    let status = resp.status();
    let mut headers = resp.headers().clone();
    strip_hop_by_hop(&mut headers);

    match resp.bytes().await {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(err) => {
            tracing::error!(error = %err, %target, "upstream response body failed");
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_headers_cannot_be_forged() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("admin"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("root@example.com"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));

        let anonymous = upstream_headers(headers.clone(), None);
        assert!(anonymous.get(USER_ID_HEADER).is_none());
        assert!(anonymous.get(USER_EMAIL_HEADER).is_none());
        assert!(anonymous.get(header::CONNECTION).is_none());
        assert_eq!(anonymous[header::ACCEPT], "text/html");

        let identity = Identity {
            user_id: "u-1".to_string(),
            email: None,
        };
        let signed_in = upstream_headers(headers, Some(&identity));
        assert_eq!(signed_in[USER_ID_HEADER], "u-1");
        assert!(signed_in.get(USER_EMAIL_HEADER).is_none());
    }

    #[test]
    fn target_keeps_path_and_query() {
        let upstream = Upstream::new("http://127.0.0.1:4321/", Duration::from_secs(1)).unwrap();
        let uri: Uri = "/guestbook?page=2".parse().unwrap();
        assert_eq!(upstream.target(&uri), "http://127.0.0.1:4321/guestbook?page=2");
    }
}
