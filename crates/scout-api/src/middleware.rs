use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

pub use scout_types::api::Claims;

fn jwt_secret() -> String {
    std::env::var("SCOUT_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into())
}

fn decode_bearer(header_value: &str, secret: &str) -> Option<Claims> {
    let token = header_value.strip_prefix("Bearer ")?;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Extract and validate the identity provider's JWT from the Authorization
/// header.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode_bearer(auth_header, &jwt_secret()).ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Optional authentication for endpoints that also serve anonymous
/// callers (the chat round-trip). An invalid token is treated the same as
/// no token.
pub struct MaybeClaims(pub Option<Claims>);

impl<S> FromRequestParts<S> for MaybeClaims
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| decode_bearer(v, &jwt_secret()));
        Ok(MaybeClaims(claims))
    }
}
