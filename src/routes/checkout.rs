use axum::{Json, Router, extract::State, routing::post};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutQuote, CheckoutQuoteRequest, CheckoutRequest, CheckoutResponse},
    error::AppResult,
    middleware::auth::OptionalAuthUser,
    middleware::session::CartSession,
    response::ApiResponse,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quote", post(quote))
        .route("/", post(checkout))
}

#[utoipa::path(
    post,
    path = "/api/checkout/quote",
    params(
        ("x-cart-session" = Uuid, Header, description = "Cart session id")
    ),
    request_body = CheckoutQuoteRequest,
    responses(
        (status = 200, description = "Price the current cart", body = ApiResponse<CheckoutQuote>),
        (status = 400, description = "Empty cart or missing customer fields"),
    ),
    tag = "Checkout"
)]
pub async fn quote(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Json(payload): Json<CheckoutQuoteRequest>,
) -> AppResult<Json<ApiResponse<CheckoutQuote>>> {
    let resp = checkout_service::quote(&state, session, payload)?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    params(
        ("x-cart-session" = Uuid, Header, description = "Cart session id")
    ),
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order created with payment instructions", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Empty cart, unknown payment method or insufficient stock"),
    ),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    CartSession(session): CartSession,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let resp = checkout_service::checkout(&state, user.as_ref(), session, payload).await?;
    Ok(Json(resp))
}
