use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    cart::{CartEntry, CartProduct},
    dto::{
        admin::{
            AdminOrderQuery, CategoryChangeResponse, DashboardSummary, DeleteCategoryRequest,
            LowStockQuery, ProfileList, ProfileView, RenameCategoryRequest, StockAdjustRequest,
            StockAdjustResponse, TopProduct, UpdateOrderStatusRequest, UpdateOrderStatusResponse,
            UpdateProfileRequest,
        },
        auth::{
            AdminSetupRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
            RegisterRequest, ResetPasswordRequest,
        },
        cart::{AddToCartRequest, CartView, SetQuantityRequest},
        orders::{
            CancelOrderRequest, CancellationReason, CheckoutQuote, CheckoutQuoteRequest,
            CheckoutRequest, CheckoutResponse, CustomerData, OrderList, OrderWithItems,
            PaymentProofResponse,
        },
        products::{
            CategoryList, CategorySummary, CreateProductRequest, ProductList,
            UpdateProductRequest,
        },
    },
    models::{Order, OrderItem, OrderStatus, PaymentMethod, Product, Profile, User},
    payments::PaymentInstructions,
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, checkout, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::forgot_password,
        auth::reset_password,
        auth::setup_admin,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::upload_product_image,
        products::adjust_stock,
        products::list_categories,
        cart::view_cart,
        cart::add_to_cart,
        cart::set_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        checkout::quote,
        checkout::checkout,
        orders::list_my_orders,
        orders::get_my_order,
        orders::cancel_order,
        orders::upload_payment_proof,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::delete_order,
        admin::list_low_stock,
        admin::dashboard,
        admin::list_categories_admin,
        admin::rename_category,
        admin::delete_category,
        admin::list_profiles,
        admin::update_profile
    ),
    components(
        schemas(
            User,
            Product,
            Profile,
            Order,
            OrderItem,
            OrderStatus,
            PaymentMethod,
            PaymentInstructions,
            CartProduct,
            CartEntry,
            CartView,
            AddToCartRequest,
            SetQuantityRequest,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            AdminSetupRequest,
            CustomerData,
            CheckoutQuoteRequest,
            CheckoutQuote,
            CheckoutRequest,
            CheckoutResponse,
            OrderList,
            OrderWithItems,
            CancellationReason,
            CancelOrderRequest,
            PaymentProofResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CategorySummary,
            CategoryList,
            AdminOrderQuery,
            LowStockQuery,
            StockAdjustRequest,
            StockAdjustResponse,
            DashboardSummary,
            TopProduct,
            RenameCategoryRequest,
            DeleteCategoryRequest,
            CategoryChangeResponse,
            ProfileView,
            ProfileList,
            UpdateProfileRequest,
            UpdateOrderStatusRequest,
            UpdateOrderStatusResponse,
            params::Pagination,
            params::ProductQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<DashboardSummary>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog and category endpoints"),
        (name = "Cart", description = "Session cart endpoints"),
        (name = "Checkout", description = "Checkout endpoints"),
        (name = "Orders", description = "Customer order endpoints"),
        (name = "Admin", description = "Back-office endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use utoipa::OpenApi;

    use super::ApiDoc;

    #[test]
    fn published_paths_match_the_route_table() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/cart",
            "/api/cart/items",
            "/api/cart/items/{product_id}",
            "/api/products/categories",
            "/api/auth/admin-setup",
            "/api/admin/categories",
            "/api/admin/users",
            "/api/admin/users/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path {path}");
        }
        // Old spellings must not linger in the published surface.
        for path in [
            "/api/categories",
            "/api/auth/setup-admin",
            "/api/admin/profiles",
            "/api/cart/{product_id}",
        ] {
            assert!(!doc.paths.paths.contains_key(path), "stale path {path}");
        }
    }
}
