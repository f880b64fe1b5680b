// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delegated-authorization endpoints.
//!
//! `/auth` issues a single-use state token bound to a chat and redirects to
//! the provider. `/auth/callback` consumes the token, links the account, and
//! reports the outcome on the auth topic for the relay to deliver.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use tasktally_bus::publish_json;
use tasktally_core::{AuthErrorKind, AuthNotification, ChatId};

use crate::server::WebhookState;

/// Name of the cookie binding the browser to the issued state token.
pub const STATE_COOKIE: &str = "oauth_state";

const STATE_BYTES: usize = 32;

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_state_token() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Deserialize)]
pub struct AuthStartQuery {
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Set by the provider when the user declines.
    #[serde(default)]
    pub error: Option<String>,
}

fn page(status: StatusCode, title: &str, body: &str) -> Response {
    (
        status,
        Html(format!(
            "<!doctype html><html><head><title>{title}</title></head>\
             <body><h1>{title}</h1><p>{body}</p></body></html>"
        )),
    )
        .into_response()
}

/// GET /auth?chat_id=
pub async fn get_auth(
    State(state): State<WebhookState>,
    Query(query): Query<AuthStartQuery>,
    jar: CookieJar,
) -> Response {
    let Some(chat_id) = query
        .chat_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(ChatId)
    else {
        return (StatusCode::BAD_REQUEST, "missing or invalid chat_id").into_response();
    };

    let Some(client_id) = state.auth.client_id.as_deref() else {
        warn!("authorization requested but oauth.client_id is not configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "authorization is not configured",
        )
            .into_response();
    };

    let token = generate_state_token();
    let location = match reqwest::Url::parse_with_params(
        &state.auth.authorize_url,
        &[
            ("client_id", client_id),
            ("scope", state.auth.scope.as_str()),
            ("state", token.as_str()),
        ],
    ) {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, "oauth.authorize_url is not a valid URL");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(e) = state
        .sessions
        .store_pending_auth(&token, chat_id, state.auth.state_ttl)
        .await
    {
        error!(chat_id = %chat_id, error = %e, "failed to store pending authorization");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let cookie = Cookie::build((STATE_COOKIE, token))
        .path("/auth")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    debug!(chat_id = %chat_id, "authorization redirect issued");
    (jar.add(cookie), Redirect::to(location.as_str())).into_response()
}

/// GET /auth/callback?state=&code=
pub async fn get_callback(
    State(state): State<WebhookState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let Some(token) = query.state.as_deref().filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing state").into_response();
    };
    match jar.get(STATE_COOKIE) {
        Some(cookie) if cookie.value() == token => {}
        Some(_) => {
            warn!("authorization callback state does not match cookie");
            return (StatusCode::BAD_REQUEST, "state mismatch").into_response();
        }
        None => {
            return (StatusCode::BAD_REQUEST, "state cookie not found").into_response();
        }
    }

    let chat_id = match state.sessions.take_pending_auth(token).await {
        Ok(Some(chat_id)) => chat_id,
        Ok(None) => {
            debug!("authorization callback for unknown or expired state");
            return page(
                StatusCode::BAD_REQUEST,
                "Link expired",
                "This authorization link is no longer valid. Send /auth in the chat to get a new one.",
            );
        }
        Err(e) => {
            error!(error = %e, "failed to read pending authorization");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path("/auth"));

    let outcome = match (query.code.as_deref(), query.error.as_deref()) {
        (Some(code), None) if !code.is_empty() => link(&state, chat_id, code).await,
        (_, error) => Err(AuthNotification::failure(
            chat_id,
            AuthErrorKind::ProviderError,
            Some(error.unwrap_or("authorization code missing").to_string()),
        )),
    };

    let notification = match &outcome {
        Ok(notification) | Err(notification) => notification,
    };
    if let Err(e) = publish_json(state.bus.as_ref(), &state.topics.auth, notification).await {
        error!(chat_id = %chat_id, error = %e, "failed to publish authorization outcome");
    }

    match outcome {
        Ok(_) => (jar, Redirect::to("/auth/finish")).into_response(),
        Err(_) => (
            jar,
            page(
                StatusCode::BAD_GATEWAY,
                "Authorization failed",
                "The task tracker did not complete the authorization. Return to the chat and try again.",
            ),
        )
            .into_response(),
    }
}

/// Exchanges the code and links the account. Both arms carry the
/// notification to publish.
async fn link(
    state: &WebhookState,
    chat_id: ChatId,
    code: &str,
) -> Result<AuthNotification, AuthNotification> {
    let account = match state.provider.exchange_code(code).await {
        Ok(account) => account,
        Err(e) => {
            error!(chat_id = %chat_id, error = %e, "authorization code exchange failed");
            return Err(AuthNotification::failure(
                chat_id,
                AuthErrorKind::ProviderError,
                Some(e.to_string()),
            ));
        }
    };

    if let Err(e) = state.ledger.link_account(chat_id, &account).await {
        error!(chat_id = %chat_id, error = %e, "failed to link account");
        return Err(AuthNotification::failure(
            chat_id,
            AuthErrorKind::Unspecified,
            Some(e.to_string()),
        ));
    }

    info!(chat_id = %chat_id, user_id = %account.external_user_id, "account linked");
    Ok(AuthNotification::success(chat_id))
}

/// GET /auth/finish
pub async fn get_finish() -> Response {
    page(
        StatusCode::OK,
        "Authorization complete",
        "Your task tracker account is linked. You can close this page and return to the chat.",
    )
}
