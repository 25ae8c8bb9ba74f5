use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde_json::Value;
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// Derive the effective role from the two metadata bags. The
/// app-controlled bag wins over the user-controlled one; the first bag
/// carrying a string `role` decides, compared case-insensitively against
/// "admin". Anything else defaults to the plain user role.
pub fn derive_role(app_metadata: Option<&Value>, user_metadata: Option<&Value>) -> Role {
    let candidate = [app_metadata, user_metadata]
        .into_iter()
        .flatten()
        .find_map(|bag| bag.get("role").and_then(Value::as_str));
    match candidate {
        Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
        _ => Role::User,
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Admin.as_str())
}

fn decode_bearer(parts: &axum::http::request::Parts) -> Result<Option<AuthUser>, AppError> {
    let auth_header = match parts.headers.get(header::AUTHORIZATION) {
        Some(value) => value,
        None => return Ok(None),
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

    if !auth_str.starts_with("Bearer ") {
        return Err(AppError::BadRequest("Invalid Authorization scheme".into()));
    }
    let token = auth_str.trim_start_matches("Bearer ").trim();

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::BadRequest("Invalid or expired token".into()))?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

    Ok(Some(AuthUser {
        user_id,
        role: decoded.claims.role.clone(),
    }))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        decode_bearer(parts)?
            .ok_or_else(|| AppError::BadRequest("Missing Authorization header".into()))
    }
}

/// Guest checkout is permitted: no Authorization header yields `None`,
/// but a present-and-broken token is still rejected.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuthUser(decode_bearer(parts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, derive_role};
    use serde_json::json;

    #[test]
    fn app_metadata_role_wins_over_user_metadata() {
        let app = json!({ "role": "admin" });
        let user = json!({ "role": "user" });
        assert_eq!(derive_role(Some(&app), Some(&user)), Role::Admin);

        let app = json!({ "role": "user" });
        let user = json!({ "role": "admin" });
        assert_eq!(derive_role(Some(&app), Some(&user)), Role::User);
    }

    #[test]
    fn user_metadata_is_consulted_when_app_bag_has_no_string_role() {
        let app = json!({ "role": 7 });
        let user = json!({ "role": "ADMIN" });
        assert_eq!(derive_role(Some(&app), Some(&user)), Role::Admin);
        assert_eq!(derive_role(None, Some(&user)), Role::Admin);
    }

    #[test]
    fn default_deny_to_plain_user() {
        assert_eq!(derive_role(None, None), Role::User);
        let noise = json!({ "plan": "gold" });
        assert_eq!(derive_role(Some(&noise), Some(&noise)), Role::User);
        let wrong = json!({ "role": "administrator" });
        assert_eq!(derive_role(Some(&wrong), None), Role::User);
    }
}
