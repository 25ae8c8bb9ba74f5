use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, Product, Profile};
use crate::routes::params::{Pagination, SortOrder};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateOrderStatusResponse {
    pub order: Order,
    /// Lets a client that applied the change optimistically roll back.
    pub previous_status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminOrderQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
    /// Matches customer name or email, case-insensitively.
    pub q: Option<String>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub threshold: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockAdjustRequest {
    pub delta: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockAdjustResponse {
    pub product: Product,
    pub new_stock: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub orders: i64,
    pub products: i64,
    pub low_stock: i64,
    pub revenue: i64,
    pub pending: i64,
    pub paid: i64,
    pub cancelled: i64,
    pub last_orders: Vec<Order>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_sold: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameCategoryRequest {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteCategoryRequest {
    pub name: String,
    /// Products keep existing; removal requires a destination category.
    pub reassign_to: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryChangeResponse {
    pub products_updated: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileList {
    pub items: Vec<ProfileView>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
}
