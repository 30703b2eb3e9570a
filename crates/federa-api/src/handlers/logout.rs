//! RP-initiated logout endpoints
//!
//! Every path ends in a redirect or a static page; logout never answers
//! with an error status.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Response},
    Extension, Form,
};
use serde::Deserialize;
use tracing::debug;

use federa_core::{ClientInfo, TenantContext};
use federa_oidc::LogoutRequest;

use super::found;
use crate::client_info::RequestClient;
use crate::state::AppState;

/// End-session parameters (query string or form body)
#[derive(Debug, Default, Deserialize)]
pub struct EndSessionParams {
    pub id_token_hint: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub state: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
}

/// Value of cookie `name` in the request's `Cookie` headers
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `GET /{tenant}/connect/logout`
pub async fn end_session(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    RequestClient(client): RequestClient,
    headers: HeaderMap,
    Query(params): Query<EndSessionParams>,
) -> Response {
    run_end_session(&state, &context, client, &headers, params).await
}

/// `POST /{tenant}/connect/logout`
pub async fn end_session_form(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    RequestClient(client): RequestClient,
    headers: HeaderMap,
    Form(params): Form<EndSessionParams>,
) -> Response {
    run_end_session(&state, &context, client, &headers, params).await
}

async fn run_end_session(
    state: &AppState,
    context: &TenantContext,
    client: ClientInfo,
    headers: &HeaderMap,
    params: EndSessionParams,
) -> Response {
    let cookie_name = &state.settings.session_cookie_name;
    debug!(client_id = ?params.client_id, "End-session request");

    let outcome = state
        .logout
        .begin(
            context,
            LogoutRequest {
                id_token_hint: params.id_token_hint,
                post_logout_redirect_uri: params.post_logout_redirect_uri,
                state: params.state,
                client_id: params.client_id,
                session_id: session_cookie(headers, cookie_name),
                client,
            },
        )
        .await;

    let mut response = found(outcome.location(), &state.settings.logout_complete_path);
    let expired = format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", cookie_name);
    if let Ok(value) = HeaderValue::from_str(&expired) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// `GET /logout/callback?state=..`
pub async fn logout_callback(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    Query(params): Query<CallbackParams>,
) -> Response {
    let outcome = state.logout.complete(params.state.as_deref(), &client).await;
    found(outcome.location(), &state.settings.error_path)
}

/// Default landing page after logout
pub async fn logout_complete() -> impl IntoResponse {
    Html(
        "<!DOCTYPE html><html><head><title>Signed out</title></head>\
         <body><h1>You have been signed out.</h1></body></html>",
    )
}

/// Landing page for logout callbacks that could not be matched
pub async fn logout_error() -> impl IntoResponse {
    Html(
        "<!DOCTYPE html><html><head><title>Logout incomplete</title></head>\
         <body><h1>Logout incomplete</h1>\
         <p>Your session here has ended, but we could not return you to the application. \
         Please close this window.</p></body></html>",
    )
}
