use axum::extract::FromRequestParts;
use uuid::Uuid;

use crate::error::AppError;

pub const CART_SESSION_HEADER: &str = "x-cart-session";

/// Opaque per-browser-session key for the in-memory cart. The client
/// generates a UUID once and sends it on every cart/checkout request;
/// dropping it abandons the cart.
#[derive(Debug, Clone, Copy)]
pub struct CartSession(pub Uuid);

impl<S> FromRequestParts<S> for CartSession
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CART_SESSION_HEADER)
            .ok_or_else(|| AppError::BadRequest("Missing x-cart-session header".into()))?;
        let value = value
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid x-cart-session header".into()))?;
        let session = Uuid::parse_str(value.trim())
            .map_err(|_| AppError::BadRequest("x-cart-session must be a UUID".into()))?;
        Ok(CartSession(session))
    }
}
