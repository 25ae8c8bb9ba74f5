use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CancelOrderRequest, OrderList, OrderWithItems, PaymentProofResponse},
    entity::{order_items, orders},
    error::{AppError, AppResult},
    events::{OrderEvent, OrderEventKind},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    services::inventory,
    state::AppState,
    storage::PAYMENTS_BUCKET,
};

const ORDER_COLUMNS: &str = "id, user_id, customer_name, customer_email, customer_phone, \
     address, payment_method, subtotal, shipping_cost, total, status, \
     shipping_status, tracking_code, cancellation_reason, payment_proof_url, \
     created_at, updated_at";

/// Columns added after the first schema revision, aliased to NULL so the
/// reduced query still maps onto `Order`.
const ORDER_COLUMNS_REDUCED: &str = "id, user_id, customer_name, customer_email, customer_phone, \
     address, payment_method, subtotal, shipping_cost, total, status, \
     NULL::text AS shipping_status, NULL::text AS tracking_code, \
     NULL::text AS cancellation_reason, NULL::text AS payment_proof_url, \
     created_at, updated_at";

/// List the caller's orders, newest first, with line items attached. If
/// the rich projection fails (a deployment mid-migration), retry with the
/// reduced column set instead of failing the page.
pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    let rich = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    );
    let orders = match sqlx::query_as::<_, Order>(&rich)
        .bind(user.user_id)
        .fetch_all(&state.pool)
        .await
    {
        Ok(orders) => orders,
        Err(err) => {
            tracing::warn!(error = %err, "falling back to reduced orders query");
            let reduced = format!(
                "SELECT {ORDER_COLUMNS_REDUCED} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
            );
            sqlx::query_as::<_, Order>(&reduced)
                .bind(user.user_id)
                .fetch_all(&state.pool)
                .await?
        }
    };

    let grouped = fetch_items_grouped(state, orders.iter().map(|o| o.id).collect()).await?;
    let total = orders.len() as i64;
    let items = attach_items(orders, grouped);

    let meta = Meta {
        page: None,
        per_page: None,
        total: Some(total),
    };
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_my_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
    let order = sqlx::query_as::<_, Order>(&query)
        .bind(id)
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at",
    )
    .bind(order.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Customer-initiated cancellation. Allowed only while the order is
/// pending or paid; restores the reserved stock exactly once and records
/// the resolved reason on the order.
pub async fn cancel_my_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let reason = payload.resolve_reason()?;

    let mut txn = state.pool.begin().await?;

    let query = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE"
    );
    let order = sqlx::query_as::<_, Order>(&query)
        .bind(id)
        .bind(user.user_id)
        .fetch_optional(&mut *txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let status = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order has unknown status")))?;
    if !status.allows_self_service_cancel() {
        return Err(AppError::BadRequest(format!(
            "Order can no longer be cancelled in status '{}'",
            order.status
        )));
    }

    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = 'cancelled', cancellation_reason = $2, updated_at = now() \
         WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order.id)
    .bind(&reason)
    .fetch_one(&mut *txn)
    .await?;

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&mut *txn)
    .await?;

    for item in &items {
        inventory::increment_stock(&mut *txn, item.product_id, item.quantity).await?;
    }

    txn.commit().await?;

    for item in &items {
        inventory::record_movement(
            &state.pool,
            item.product_id,
            item.quantity,
            "in",
            "order_cancelled",
        )
        .await;
    }

    state.events.publish(OrderEvent {
        order_id: order.id,
        user_id: order.user_id,
        kind: OrderEventKind::Updated,
        status: order.status.clone(),
    });

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancelled",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "reason": reason })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Order cancelled", order, Some(Meta::empty())))
}

/// Store an uploaded payment receipt in the payments bucket and link it
/// onto the order. Storing is mandatory; linking is best effort, so a
/// receipt is never lost to a transient database error.
pub async fn attach_payment_proof(
    state: &AppState,
    user: Option<&AuthUser>,
    id: Uuid,
    extension: &str,
    bytes: &[u8],
) -> AppResult<ApiResponse<PaymentProofResponse>> {
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Proof body is empty".into()));
    }
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest("Invalid file extension".into()));
    }

    let row: Option<(Option<Uuid>,)> = sqlx::query_as("SELECT user_id FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let (owner,) = match row {
        Some(row) => row,
        None => return Err(AppError::NotFound),
    };
    // Guest orders accept a proof from whoever holds the order id; owned
    // orders only from their owner.
    if let Some(owner) = owner {
        if user.map(|u| u.user_id) != Some(owner) {
            return Err(AppError::Forbidden);
        }
    }

    let object = format!(
        "order-{}-{}.{}",
        &id.to_string()[..8],
        Utc::now().timestamp_millis(),
        extension
    );
    state.storage.upload(PAYMENTS_BUCKET, &object, bytes).await?;
    let url = state.storage.public_url(PAYMENTS_BUCKET, &object);

    let linked = match sqlx::query("UPDATE orders SET payment_proof_url = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(&url)
        .execute(&state.pool)
        .await
    {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(error = %err, order_id = %id, "stored proof could not be linked");
            false
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        user.map(|u| u.user_id),
        "payment_proof_upload",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id, "linked": linked })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let message = if linked {
        "Proof received".to_string()
    } else {
        "Proof received; it will be linked to the order later".to_string()
    };
    Ok(ApiResponse::success(
        message.clone(),
        PaymentProofResponse { url, linked, message },
        Some(Meta::empty()),
    ))
}

pub(crate) async fn fetch_items_grouped(
    state: &AppState,
    order_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Vec<OrderItem>>> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY created_at",
    )
    .bind(&order_ids)
    .fetch_all(&state.pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row);
    }
    Ok(grouped)
}

pub(crate) fn attach_items(
    orders: Vec<Order>,
    mut grouped: HashMap<Uuid, Vec<OrderItem>>,
) -> Vec<OrderWithItems> {
    orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect()
}

pub(crate) fn order_from_entity(model: orders::Model) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        customer_phone: model.customer_phone,
        address: model.address,
        payment_method: model.payment_method,
        subtotal: model.subtotal,
        shipping_cost: model.shipping_cost,
        total: model.total,
        status: model.status,
        shipping_status: model.shipping_status,
        tracking_code: model.tracking_code,
        cancellation_reason: model.cancellation_reason,
        payment_proof_url: model.payment_proof_url,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_item_from_entity(model: order_items::Model) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        price: model.price,
        subtotal: model.subtotal,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
