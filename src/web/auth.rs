//! Admin session cookie authentication.
//!
//! A successful login sets `admin_auth=<expiry>.<signature>`, where the
//! signature is HMAC-SHA256 over the admin username and the expiry (unix
//! seconds), base64url without padding. Nothing is stored server-side.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use cookie::{Cookie, SameSite};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::GatewayConfig;
use crate::web::server::GatewayState;

pub const COOKIE_NAME: &str = "admin_auth";

type HmacSha256 = Hmac<Sha256>;

/// Single shared admin credential pair plus the cookie signing key.
#[derive(Clone)]
pub struct AdminAuth {
    username: String,
    password: SecretString,
    key: SecretString,
    ttl: Duration,
}

impl AdminAuth {
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        key: SecretString,
        ttl: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            key,
            ttl,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.admin_username.clone(),
            config.admin_password.clone(),
            config.session_secret.clone(),
            config.session_ttl,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Constant-time check of both fields; never says which one was wrong.
    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = password
            .as_bytes()
            .ct_eq(self.password.expose_secret().as_bytes());
        bool::from(user_ok & pass_ok)
    }

    /// Cookie value valid until `now + ttl`.
    pub fn issue(&self, now: i64) -> Option<String> {
        let expires = now + self.ttl.as_secs() as i64;
        let signature = self.sign(expires)?;
        Some(format!("{expires}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    pub fn verify(&self, token: &str, now: i64) -> bool {
        let Some((expires, signature)) = token.split_once('.') else {
            return false;
        };
        let Ok(expires) = expires.parse::<i64>() else {
            return false;
        };
        if expires <= now {
            return false;
        }
        let Ok(given) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        let Some(expected) = self.sign(expires) else {
            return false;
        };
        expected.as_slice().ct_eq(given.as_slice()).into()
    }

    /// `Set-Cookie` value for a fresh session.
    pub fn session_cookie(&self, token: String) -> String {
        Cookie::build((COOKIE_NAME, token))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::seconds(self.ttl.as_secs() as i64))
            .build()
            .to_string()
    }

    /// `Set-Cookie` value that removes the session.
    pub fn cleared_cookie() -> String {
        Cookie::build((COOKIE_NAME, ""))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::ZERO)
            .build()
            .to_string()
    }

    fn sign(&self, expires: i64) -> Option<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret().as_bytes()).ok()?;
        mac.update(self.username.as_bytes());
        mac.update(b"|");
        mac.update(expires.to_string().as_bytes());
        Some(mac.finalize().into_bytes().to_vec())
    }
}

/// The `admin_auth` cookie value, if the request carries one.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == COOKIE_NAME)
        .map(|c| c.value().to_string())
}

/// Rejects requests without a valid admin session cookie.
pub async fn admin_middleware(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let now = chrono::Utc::now().timestamp();
    if let Some(token) = session_token(&headers)
        && state.auth.verify(&token, now)
    {
        return next.run(request).await;
    }
    tracing::debug!(path = %request.uri().path(), "Rejected admin request");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Unauthorized" })),
    )
        .into_response()
}
