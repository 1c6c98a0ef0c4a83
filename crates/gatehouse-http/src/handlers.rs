use axum::Form;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use gatehouse_api::{IdentityProvider, SessionTokens};
use gatehouse_auth::CookieJar;
use serde::Deserialize;

use crate::SharedGate;
use crate::middleware::apply_cookies;

/// Query string of the credential-exchange callback: either a one-time
/// `code`, or a token pair handed over directly.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn auth_callback<P: IdentityProvider>(
    State(gate): State<SharedGate<P>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let tokens = if let Some(code) = non_empty(params.code) {
        match gate.validator().exchange(&code).await {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!(error = %err, "authorization code exchange failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Could not complete sign-in")
                    .into_response();
            }
        }
    } else if let (Some(access), Some(refresh)) = (
        non_empty(params.access_token),
        non_empty(params.refresh_token),
    ) {
        SessionTokens::new(access, refresh)
    } else {
        return (
            StatusCode::BAD_REQUEST,
            "No authentication credentials provided",
        )
            .into_response();
    };

    let mut jar = CookieJar::new();
    if let Err(err) = gate.store().write(&mut jar, &tokens) {
        tracing::warn!(error = %err, "rejecting session tokens that cannot be stored");
        return (StatusCode::BAD_REQUEST, "Invalid authentication credentials").into_response();
    }

    tracing::info!("session established");
    let mut response = Redirect::to(&gate.redirects().after_login).into_response();
    apply_cookies(&jar, response.headers_mut());
    response
}

/// Form posted by the sign-in page: an OAuth provider name, or an email
/// address for a one-time link.
#[derive(Debug, Default, Deserialize)]
pub struct SignInForm {
    pub email: Option<String>,
    pub provider: Option<String>,
}

fn valid_provider_name(name: &str) -> bool {
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

pub async fn sign_in<P: IdentityProvider>(
    State(gate): State<SharedGate<P>>,
    Form(form): Form<SignInForm>,
) -> Response {
    if let Some(provider) = non_empty(form.provider) {
        if !valid_provider_name(&provider) {
            return (StatusCode::BAD_REQUEST, "Unknown sign-in provider").into_response();
        }
        let return_to = &gate.redirects().oauth_return_to;
        return match gate.validator().authorize_url(&provider, return_to) {
            Ok(url) => {
                tracing::info!(%provider, "starting OAuth sign-in");
                Redirect::to(&url).into_response()
            }
            Err(err) => {
                tracing::warn!(error = %err, %provider, "OAuth sign-in unavailable");
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not start sign-in").into_response()
            }
        };
    }

    let Some(email) = non_empty(form.email) else {
        return (StatusCode::BAD_REQUEST, "Email is required!").into_response();
    };

    match gate.validator().send_sign_in_link(&email).await {
        Ok(()) => {
            tracing::info!("sign-in link sent");
            (StatusCode::OK, "Check your email for a sign-in link").into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "email sign-in failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not start sign-in").into_response()
        }
    }
}

pub async fn sign_out<P: IdentityProvider>(State(gate): State<SharedGate<P>>) -> Response {
    let mut jar = CookieJar::new();
    gate.store().clear(&mut jar);

    tracing::info!("session cleared");
    let mut response = Redirect::to(&gate.redirects().sign_in).into_response();
    apply_cookies(&jar, response.headers_mut());
    response
}
