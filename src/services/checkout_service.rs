use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CheckoutQuote, CheckoutQuoteRequest, CheckoutRequest, CheckoutResponse, OrderWithItems,
    },
    entity::{
        order_items::ActiveModel as OrderItemActive,
        orders::{ActiveModel as OrderActive, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    events::{OrderEvent, OrderEventKind},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, PaymentMethod},
    payments,
    response::{ApiResponse, Meta},
    services::order_service::{order_from_entity, order_item_from_entity},
    state::AppState,
};

/// Price the current cart without creating anything. Mirrors the order
/// summary step of the checkout wizard.
pub fn quote(
    state: &AppState,
    session: Uuid,
    payload: CheckoutQuoteRequest,
) -> AppResult<ApiResponse<CheckoutQuote>> {
    payload.customer.validate()?;

    let cart = state.carts.snapshot(session);
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let subtotal = cart.total();
    let shipping_cost = state.shipping.cost_for(subtotal);
    let data = CheckoutQuote {
        subtotal,
        shipping_cost,
        total: subtotal + shipping_cost,
        item_count: cart.item_count(),
    };
    Ok(ApiResponse::success("Quote", data, Some(Meta::empty())))
}

/// Turn the session cart into an order: validate the customer snapshot,
/// re-check and decrement stock under row locks, persist order and line
/// items atomically, then clear the cart. Instant-settling methods are
/// confirmed paid right after commit; a failed confirmation leaves the
/// order pending rather than failing the checkout.
pub async fn checkout(
    state: &AppState,
    user: Option<&AuthUser>,
    session: Uuid,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    payload.customer.validate()?;
    let method = PaymentMethod::parse(&payload.payment_method)
        .ok_or_else(|| AppError::BadRequest("Unknown payment method".into()))?;

    let cart = state.carts.snapshot(session);
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let subtotal = cart.total();
    let shipping_cost = state.shipping.cost_for(subtotal);
    let total = subtotal + shipping_cost;
    let user_id = user.map(|u| u.user_id);

    // Lock products in a stable order so two concurrent checkouts holding
    // the same products cannot deadlock on each other's row locks.
    let mut entries = cart.entries().to_vec();
    entries.sort_by_key(|entry| entry.product_id);

    let txn = state.orm.begin().await?;

    for entry in &entries {
        let product = Products::find_by_id(entry.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let product = match product {
            Some(p) => p,
            None => {
                return Err(AppError::BadRequest(format!(
                    "Product {} is no longer available",
                    entry.name
                )));
            }
        };
        if product.stock < entry.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
    }

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user_id),
        customer_name: Set(payload.customer.name.clone()),
        customer_email: Set(payload.customer.email.clone()),
        customer_phone: Set(payload.customer.phone.clone()),
        address: Set(payload.customer.address_snapshot()),
        payment_method: Set(method.as_str().to_string()),
        subtotal: Set(subtotal),
        shipping_cost: Set(shipping_cost),
        total: Set(total),
        status: Set("pending".into()),
        shipping_status: Set(None),
        tracking_code: Set(None),
        cancellation_reason: Set(None),
        payment_proof_url: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::new();
    for entry in &entries {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(entry.product_id),
            product_name: Set(entry.name.clone()),
            quantity: Set(entry.quantity),
            price: Set(entry.price),
            subtotal: Set(entry.price * entry.quantity as i64),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(entry.quantity))
            .filter(ProdCol::Id.eq(entry.product_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    state.carts.clear(session);

    state.events.publish(OrderEvent {
        order_id: order.id,
        user_id,
        kind: OrderEventKind::Inserted,
        status: order.status.clone(),
    });

    let mut order = order_from_entity(order);
    if method.settles_immediately() {
        match confirm_payment(state, order.id).await {
            Ok(confirmed) => order = confirmed,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    order_id = %order.id,
                    "payment confirmation failed, order left pending"
                );
            }
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        user_id,
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payment_method": method.as_str(),
            "total": total,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let payment = payments::instructions_for(method, &state.merchant, total);
    Ok(ApiResponse::success(
        "Order created",
        CheckoutResponse {
            order: OrderWithItems { order, items },
            payment,
        },
        Some(Meta::empty()),
    ))
}

/// Mark an order paid. Idempotent for already-paid orders; cancelled
/// orders cannot be revived.
pub async fn confirm_payment(state: &AppState, order_id: Uuid) -> AppResult<Order> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.status == "cancelled" {
        return Err(AppError::BadRequest("Order is cancelled".into()));
    }
    if order.status == "paid" {
        txn.commit().await?;
        return Ok(order_from_entity(order));
    }

    let user_id = order.user_id;
    let mut active: OrderActive = order.into();
    active.status = Set("paid".into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    state.events.publish(OrderEvent {
        order_id: order.id,
        user_id,
        kind: OrderEventKind::Updated,
        status: order.status.clone(),
    });

    if let Err(err) = log_audit(
        &state.pool,
        user_id,
        "order_paid",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(order_from_entity(order))
}
