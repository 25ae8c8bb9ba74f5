use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartView, SetQuantityRequest},
    error::AppResult,
    middleware::session::CartSession,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(view_cart).delete(clear_cart))
        .route("/items", post(add_to_cart))
        .route("/items/{product_id}", patch(set_quantity))
        .route("/items/{product_id}", delete(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    params(
        ("x-cart-session" = Uuid, Header, description = "Cart session id")
    ),
    responses(
        (status = 200, description = "Current session cart", body = ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn view_cart(
    State(state): State<AppState>,
    CartSession(session): CartSession,
) -> Json<ApiResponse<CartView>> {
    Json(cart_service::view_cart(&state, session))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    params(
        ("x-cart-session" = Uuid, Header, description = "Cart session id")
    ),
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Product added", body = ApiResponse<CartView>),
        (status = 400, description = "Invalid quantity or insufficient stock"),
        (status = 404, description = "Product not found"),
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::add_item(&state, session, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/items/{product_id}",
    params(
        ("x-cart-session" = Uuid, Header, description = "Cart session id"),
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = SetQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated; zero removes the entry", body = ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn set_quantity(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<SetQuantityRequest>,
) -> Json<ApiResponse<CartView>> {
    Json(cart_service::set_quantity(&state, session, product_id, payload))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{product_id}",
    params(
        ("x-cart-session" = Uuid, Header, description = "Cart session id"),
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed from cart", body = ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    CartSession(session): CartSession,
    Path(product_id): Path<Uuid>,
) -> Json<ApiResponse<CartView>> {
    Json(cart_service::remove_item(&state, session, product_id))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    params(
        ("x-cart-session" = Uuid, Header, description = "Cart session id")
    ),
    responses(
        (status = 200, description = "Cart cleared", body = ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    CartSession(session): CartSession,
) -> Json<ApiResponse<CartView>> {
    Json(cart_service::clear_cart(&state, session))
}
