//! Bearer-token verification for the authenticated surface.
//!
//! Tokens are issued by the external identity provider; this service only
//! verifies them (HS256) and exposes the subject as the caller's user id.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the identity provider's stable user id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization token")]
    MissingToken,

    #[error("invalid authorization token")]
    InvalidToken,

    #[error("authorization token expired")]
    ExpiredToken,
}

/// Verified caller identity, inserted into request extensions by
/// [`require_auth`].
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => AuthError::InvalidToken,
    })
}

fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

fn auth_error_response(err: AuthError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// Middleware guarding every route that needs a verified caller. On success
/// the handler can read `Extension<AuthenticatedUser>`; on failure the
/// request ends here with a 401.
pub async fn require_auth(
    State(secret): State<String>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let Some(auth_header) = auth_header else {
        return auth_error_response(AuthError::MissingToken);
    };
    let Some(token) = extract_bearer(&auth_header) else {
        return auth_error_response(AuthError::InvalidToken);
    };
    match verify_token(token, &secret) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthenticatedUser {
                user_id: claims.sub,
            });
            next.run(request).await
        }
        Err(err) => auth_error_response(err),
    }
}

#[cfg(test)]
pub fn issue_token(user_id: &str, secret: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
