use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::admin::{
        AdminOrderQuery, DashboardSummary, LowStockQuery, TopProduct, UpdateOrderStatusRequest,
        UpdateOrderStatusResponse,
    },
    dto::orders::{OrderList, OrderWithItems},
    dto::products::ProductList,
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    events::{OrderEvent, OrderEventKind},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus},
    notify::{OrderStatusEmail, spawn_order_status_email},
    response::{ApiResponse, Meta},
    routes::params::SortOrder,
    services::inventory,
    services::order_service::{attach_items, fetch_items_grouped, order_from_entity},
    services::product_service::product_from_entity,
    state::AppState,
};

const ORDER_COLUMNS: &str = "id, user_id, customer_name, customer_email, customer_phone, \
     address, payment_method, subtotal, shipping_cost, total, status, \
     shipping_status, tracking_code, cancellation_reason, payment_proof_url, \
     created_at, updated_at";

/// Back-office order list across all customers, filterable by status and
/// by a case-insensitive match on customer name or email.
pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: AdminOrderQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(OrderCol::CustomerName).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::CustomerEmail).ilike(pattern)),
        );
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders: Vec<Order> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let grouped = fetch_items_grouped(state, orders.iter().map(|o| o.id).collect()).await?;
    let items = attach_items(orders, grouped);

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => order_from_entity(o),
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

/// Move an order to a new status. Cancelled is terminal; a transition
/// into cancelled restores the reserved stock exactly once, keyed on the
/// previous status. The previous status is echoed back so a client that
/// updated its view optimistically can roll back on rejection.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<UpdateOrderStatusResponse>> {
    ensure_admin(user)?;
    let next = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest("Unknown order status".into()))?;

    let mut txn = state.pool.begin().await?;

    let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
    let order = sqlx::query_as::<_, Order>(&query)
        .bind(id)
        .fetch_optional(&mut *txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let previous = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order has unknown status")))?;
    if !previous.allows_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move a '{}' order to '{}'",
            previous.as_str(),
            next.as_str()
        )));
    }

    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order.id)
    .bind(next.as_str())
    .fetch_one(&mut *txn)
    .await?;

    // Restock only on the first entry into cancelled.
    let mut restocked: Vec<OrderItem> = Vec::new();
    if next == OrderStatus::Cancelled && previous != OrderStatus::Cancelled {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1",
        )
        .bind(order.id)
        .fetch_all(&mut *txn)
        .await?;
        for item in &items {
            inventory::increment_stock(&mut *txn, item.product_id, item.quantity).await?;
        }
        restocked = items;
    }

    txn.commit().await?;

    for item in &restocked {
        inventory::record_movement(
            &state.pool,
            item.product_id,
            item.quantity,
            "in",
            "order_cancelled_admin",
        )
        .await;
    }

    if previous != next {
        spawn_order_status_email(OrderStatusEmail {
            email: order.customer_email.clone(),
            name: order.customer_name.clone(),
            order_id: order.id,
            status: order.status.clone(),
            total: order.total,
        });
        state.events.publish(OrderEvent {
            order_id: order.id,
            user_id: order.user_id,
            kind: OrderEventKind::Updated,
            status: order.status.clone(),
        });
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "from": previous.as_str(),
            "to": next.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        UpdateOrderStatusResponse {
            order,
            previous_status: previous.as_str().to_string(),
        },
        Some(Meta::empty()),
    ))
}

/// Hard delete. Stock is deliberately untouched: removing a record is a
/// bookkeeping action, cancellation is the path that restocks.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let mut txn = state.pool.begin().await?;

    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
        .bind(id)
        .execute(&mut *txn)
        .await?;
    let result = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(&mut *txn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::empty("Order deleted"))
}

/// Products at or below the restock threshold, most depleted first.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let threshold = query.threshold.unwrap_or(5);

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}

/// One-call aggregate for the back-office landing page.
pub async fn dashboard(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DashboardSummary>> {
    ensure_admin(user)?;

    let (orders, pending, paid, cancelled): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE status = 'pending'),
               COUNT(*) FILTER (WHERE status = 'paid'),
               COUNT(*) FILTER (WHERE status = 'cancelled')
        FROM orders
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    let (products, low_stock): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE stock <= 5) FROM products",
    )
    .fetch_one(&state.pool)
    .await?;

    let revenue_statuses: Vec<&str> = OrderStatus::ALL
        .iter()
        .filter(|status| status.counts_as_revenue())
        .map(OrderStatus::as_str)
        .collect();
    let (revenue,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status = ANY($1)",
    )
    .bind(&revenue_statuses)
    .fetch_one(&state.pool)
    .await?;

    let last_orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT 5"
    ))
    .fetch_all(&state.pool)
    .await?;

    let top_products = sqlx::query_as::<_, TopProduct>(
        r#"
        SELECT product_id, MIN(product_name) AS product_name,
               SUM(quantity)::BIGINT AS quantity_sold
        FROM order_items
        GROUP BY product_id
        ORDER BY quantity_sold DESC
        LIMIT 5
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let data = DashboardSummary {
        orders,
        products,
        low_stock,
        revenue,
        pending,
        paid,
        cancelled,
        last_orders,
        top_products,
    };
    Ok(ApiResponse::success("Dashboard", data, Some(Meta::empty())))
}
