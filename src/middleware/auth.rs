use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::attempt::Owner;
use crate::models::user::{ROLE_ADMIN, ROLE_RECRUITER};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id.
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, Error> {
        self.sub
            .parse()
            .map_err(|_| Error::Unauthorized("Token subject is not a user id".to_string()))
    }

    pub fn owner(&self) -> Result<Owner, Error> {
        Ok(Owner::User {
            user_id: self.user_id()?,
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

fn decode_bearer(req: &Request) -> Result<Claims, Error> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("bad_authorization".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))?;

    let config = crate::config::get_config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| Error::Unauthorized("invalid_token".to_string()))?;

    data.claims.user_id()?;
    Ok(data.claims)
}

pub async fn require_bearer_auth(req: Request, next: Next) -> Response {
    require_roles(req, next, &[]).await
}

pub async fn require_recruiter(req: Request, next: Next) -> Response {
    require_roles(req, next, &[ROLE_RECRUITER, ROLE_ADMIN]).await
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    require_roles(req, next, &[ROLE_ADMIN]).await
}

/// Verifies the bearer token and, when `allowed` is not empty, the caller's
/// role. The claims are stored as a request extension for the handlers.
pub async fn require_roles(mut req: Request, next: Next, allowed: &[&str]) -> Response {
    let claims = match decode_bearer(&req) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };
    if !allowed.is_empty() && !allowed.iter().any(|r| claims.has_role(r)) {
        return Error::Forbidden("forbidden".to_string()).into_response();
    }
    req.extensions_mut().insert(claims);
    next.run(req).await
}
