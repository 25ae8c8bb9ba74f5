use uuid::Uuid;

use crate::{
    cart::{CartError, CartProduct},
    dto::cart::{AddToCartRequest, CartView, SetQuantityRequest},
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: i64,
    stock: i32,
}

/// Admit a product into the session cart after re-reading its live stock
/// count; a stale product page cannot oversell.
pub async fn add_item(
    state: &AppState,
    session: Uuid,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, price, stock FROM products WHERE id = $1",
    )
    .bind(payload.product_id)
    .fetch_optional(&state.pool)
    .await?;
    let row = match row {
        Some(row) => row,
        None => return Err(AppError::NotFound),
    };

    let product = CartProduct {
        id: row.id,
        name: row.name,
        price: row.price,
    };

    state
        .carts
        .with_cart(session, |cart| cart.add(&product, payload.quantity, row.stock))
        .map_err(|err: CartError| AppError::BadRequest(err.to_string()))?;

    let view = CartView::from(state.carts.snapshot(session));
    Ok(ApiResponse::success("Added to cart", view, Some(Meta::empty())))
}

/// Zero or negative quantity removes the entry, matching the quantity
/// stepper reaching zero.
pub fn set_quantity(
    state: &AppState,
    session: Uuid,
    product_id: Uuid,
    payload: SetQuantityRequest,
) -> ApiResponse<CartView> {
    state
        .carts
        .with_cart(session, |cart| cart.set_quantity(product_id, payload.quantity));
    let view = CartView::from(state.carts.snapshot(session));
    ApiResponse::success("Cart updated", view, Some(Meta::empty()))
}

pub fn remove_item(state: &AppState, session: Uuid, product_id: Uuid) -> ApiResponse<CartView> {
    state.carts.with_cart(session, |cart| cart.remove(product_id));
    let view = CartView::from(state.carts.snapshot(session));
    ApiResponse::success("Removed from cart", view, Some(Meta::empty()))
}

pub fn view_cart(state: &AppState, session: Uuid) -> ApiResponse<CartView> {
    let view = CartView::from(state.carts.snapshot(session));
    ApiResponse::success("Cart", view, Some(Meta::empty()))
}

pub fn clear_cart(state: &AppState, session: Uuid) -> ApiResponse<CartView> {
    state.carts.clear(session);
    let view = CartView::from(state.carts.snapshot(session));
    ApiResponse::success("Cart cleared", view, Some(Meta::empty()))
}
