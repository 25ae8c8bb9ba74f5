use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::orders::{CancelOrderRequest, OrderList, OrderWithItems, PaymentProofResponse},
    error::AppResult,
    middleware::auth::{AuthUser, OptionalAuthUser},
    models::Order,
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/{id}", get(get_my_order))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/payment-proof", post(upload_payment_proof))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProofQuery {
    /// File extension of the uploaded proof, default "jpg".
    pub ext: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "The caller's orders with items, newest first", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_my_orders(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "One of the caller's orders", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_my_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_my_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled and stock restored", body = ApiResponse<Order>),
        (status = 400, description = "Order is past the cancellable stage"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_my_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/payment-proof",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("ext" = Option<String>, Query, description = "File extension, default jpg")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Proof stored; linked=false when it could not be attached", body = ApiResponse<PaymentProofResponse>),
        (status = 403, description = "Order belongs to another account"),
        (status = 404, description = "Not Found"),
    ),
    tag = "Orders"
)]
pub async fn upload_payment_proof(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ProofQuery>,
    body: Bytes,
) -> AppResult<Json<ApiResponse<PaymentProofResponse>>> {
    let ext = query.ext.as_deref().unwrap_or("jpg");
    let resp =
        order_service::attach_payment_proof(&state, user.as_ref(), id, ext, &body).await?;
    Ok(Json(resp))
}
