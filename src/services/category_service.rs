use crate::{
    audit::log_audit,
    dto::admin::{CategoryChangeResponse, DeleteCategoryRequest, RenameCategoryRequest},
    dto::products::{CategoryList, CategorySummary},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Categories are labels on products, not rows of their own; the list is
/// the distinct non-empty labels with their product counts.
pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = sqlx::query_as::<_, CategorySummary>(
        r#"
        SELECT category AS name, COUNT(*) AS products
        FROM products
        WHERE category <> ''
        GROUP BY category
        ORDER BY category
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

/// Rename is a bulk relabel. Renaming onto an existing category merges
/// the two.
pub async fn rename_category(
    state: &AppState,
    user: &AuthUser,
    payload: RenameCategoryRequest,
) -> AppResult<ApiResponse<CategoryChangeResponse>> {
    ensure_admin(user)?;
    let from = payload.from.trim();
    let to = payload.to.trim();
    if from.is_empty() || to.is_empty() {
        return Err(AppError::BadRequest(
            "Both category names are required".into(),
        ));
    }
    if from == to {
        return Err(AppError::BadRequest(
            "New category name must differ".into(),
        ));
    }

    let result = sqlx::query("UPDATE products SET category = $2 WHERE category = $1")
        .bind(from)
        .bind(to)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "category_rename",
        Some("products"),
        Some(serde_json::json!({ "from": from, "to": to })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category renamed",
        CategoryChangeResponse {
            products_updated: result.rows_affected(),
        },
        Some(Meta::empty()),
    ))
}

/// Removing a category never deletes products; they move to the given
/// destination category.
pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    payload: DeleteCategoryRequest,
) -> AppResult<ApiResponse<CategoryChangeResponse>> {
    ensure_admin(user)?;
    let name = payload.name.trim();
    let reassign_to = payload.reassign_to.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".into()));
    }
    if reassign_to.is_empty() {
        return Err(AppError::BadRequest(
            "A destination category is required".into(),
        ));
    }
    if reassign_to == name {
        return Err(AppError::BadRequest(
            "Destination must differ from the removed category".into(),
        ));
    }

    let result = sqlx::query("UPDATE products SET category = $2 WHERE category = $1")
        .bind(name)
        .bind(reassign_to)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "category_delete",
        Some("products"),
        Some(serde_json::json!({ "name": name, "reassign_to": reassign_to })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category removed",
        CategoryChangeResponse {
            products_updated: result.rows_affected(),
        },
        Some(Meta::empty()),
    ))
}
