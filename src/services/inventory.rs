use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
};

/// Atomically bump a product's stock, flooring at zero. A negative delta
/// larger than the on-hand count clamps instead of violating the stock
/// check constraint. Returns the resulting stock level.
pub async fn increment_stock(
    executor: impl sqlx::PgExecutor<'_>,
    product_id: Uuid,
    delta: i32,
) -> AppResult<i32> {
    let row: Option<(i32,)> = sqlx::query_as(
        "UPDATE products SET stock = GREATEST(0, stock + $2) WHERE id = $1 RETURNING stock",
    )
    .bind(product_id)
    .bind(delta)
    .fetch_optional(executor)
    .await?;

    row.map(|(stock,)| stock).ok_or(AppError::NotFound)
}

/// Append a stock-movement ledger row. Best effort: the ledger is
/// advisory, so a failed insert is logged and never fails the caller.
pub async fn record_movement(
    pool: &DbPool,
    product_id: Uuid,
    quantity: i32,
    movement_type: &str,
    reason: &str,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO stock_movements (id, product_id, quantity, movement_type, reason)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(quantity)
    .bind(movement_type)
    .bind(reason)
    .execute(pool)
    .await;

    if let Err(err) = result {
        tracing::warn!(
            error = %err,
            product_id = %product_id,
            movement_type,
            "stock movement insert failed"
        );
    }
}
