use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use tea_storefront_api::{
    cart::CartStore,
    config::{MerchantConfig, ShippingConfig},
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        admin::{AdminOrderQuery, StockAdjustRequest, UpdateOrderStatusRequest},
        cart::AddToCartRequest,
        orders::{CancelOrderRequest, CancellationReason, CheckoutRequest, CustomerData},
    },
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    events::OrderEventKind,
    middleware::auth::AuthUser,
    payments::PaymentInstructions,
    routes::params::Pagination,
    services::{admin_service, cart_service, checkout_service, order_service, product_service},
    state::AppState,
    storage::Storage,
};
use uuid::Uuid;

// The flow tests share one database; run them one at a time.
static DB_LOCK: std::sync::OnceLock<tokio::sync::Mutex<()>> = std::sync::OnceLock::new();

fn db_lock() -> &'static tokio::sync::Mutex<()> {
    DB_LOCK.get_or_init(|| tokio::sync::Mutex::new(()))
}

fn customer() -> CustomerData {
    CustomerData {
        name: "Maria Silva".into(),
        email: "maria@example.com".into(),
        phone: "11 99999-0000".into(),
        address: "Rua das Flores".into(),
        number: "42".into(),
        complement: None,
        neighborhood: "Centro".into(),
        city: "Sao Paulo".into(),
        state: "SP".into(),
        cep: "01000-000".into(),
    }
}

// Integration flow: guest fills a cart, checks out with pix, the order
// settles immediately and stock is reserved.
#[tokio::test]
async fn guest_pix_checkout_settles_and_reserves_stock() -> anyhow::Result<()> {
    let _guard = db_lock().lock().await;
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let white_tea = create_product(&state, "Pai Mu Tan", 2500, 10).await?;
    let chamomile = create_product(&state, "Camomila Premium", 1000, 10).await?;

    let session = Uuid::new_v4();
    let mut events = state.events.subscribe(None);

    cart_service::add_item(
        &state,
        session,
        AddToCartRequest {
            product_id: white_tea,
            quantity: 2,
        },
    )
    .await?;
    cart_service::add_item(
        &state,
        session,
        AddToCartRequest {
            product_id: chamomile,
            quantity: 1,
        },
    )
    .await?;

    let resp = checkout_service::checkout(
        &state,
        None,
        session,
        CheckoutRequest {
            customer: customer(),
            payment_method: "pix".into(),
        },
    )
    .await?;
    let data = resp.data.unwrap();

    // 2 x 2500 + 1 x 1000 = 6000 subtotal, below the free threshold
    assert_eq!(data.order.order.subtotal, 6000);
    assert_eq!(data.order.order.shipping_cost, 1290);
    assert_eq!(data.order.order.total, 7290);
    assert_eq!(data.order.items.len(), 2);
    assert_eq!(data.order.order.status, "paid");

    match data.payment {
        PaymentInstructions::Pix { payload } => {
            assert!(payload.contains("540672.90"));
        }
        other => panic!("expected pix instructions, got {other:?}"),
    }

    // Checkout consumed the cart and the stock
    assert!(state.carts.snapshot(session).is_empty());
    assert_eq!(product_stock(&state, white_tea).await?, 8);
    assert_eq!(product_stock(&state, chamomile).await?, 9);

    let inserted = events.recv().await.expect("insert event");
    assert_eq!(inserted.kind, OrderEventKind::Inserted);
    assert_eq!(inserted.order_id, data.order.order.id);

    Ok(())
}

// A signed-in customer checks out with boleto (stays pending), then
// cancels; the reserved stock comes back exactly once.
#[tokio::test]
async fn boleto_order_can_be_cancelled_and_restocks_once() -> anyhow::Result<()> {
    let _guard = db_lock().lock().await;
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let hibiscus = create_product(&state, "Hibisco Organico", 1500, 6).await?;
    let user_id = create_user(&state, "cliente@example.com").await?;
    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };

    let session = Uuid::new_v4();
    cart_service::add_item(
        &state,
        session,
        AddToCartRequest {
            product_id: hibiscus,
            quantity: 4,
        },
    )
    .await?;

    let resp = checkout_service::checkout(
        &state,
        Some(&auth_user),
        session,
        CheckoutRequest {
            customer: customer(),
            payment_method: "boleto".into(),
        },
    )
    .await?;
    let order = resp.data.unwrap().order.order;
    assert_eq!(order.status, "pending");
    assert_eq!(product_stock(&state, hibiscus).await?, 2);

    // Order shows up on the customer's own list
    let mine = order_service::list_my_orders(&state, &auth_user).await?;
    let mine = mine.data.unwrap();
    assert_eq!(mine.items.len(), 1);
    assert_eq!(mine.items[0].items.len(), 1);

    let cancelled = order_service::cancel_my_order(
        &state,
        &auth_user,
        order.id,
        CancelOrderRequest {
            reason: CancellationReason::DeliveryTime,
            custom_reason: None,
        },
    )
    .await?;
    let cancelled = cancelled.data.unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("Delivery time too long")
    );
    assert_eq!(product_stock(&state, hibiscus).await?, 6);

    // A second cancellation is rejected and must not restock again
    let again = order_service::cancel_my_order(
        &state,
        &auth_user,
        order.id,
        CancelOrderRequest {
            reason: CancellationReason::ChangeOfMind,
            custom_reason: None,
        },
    )
    .await;
    assert!(again.is_err());
    assert_eq!(product_stock(&state, hibiscus).await?, 6);

    Ok(())
}

// Cancelling an order with two line items puts back each product's own
// quantity, and only once.
#[tokio::test]
async fn cancelling_multi_item_order_restocks_each_line_item() -> anyhow::Result<()> {
    let _guard = db_lock().lock().await;
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let green_tea = create_product(&state, "Cha Verde Especial", 2000, 9).await?;
    let mate = create_product(&state, "Erva Mate Tostada", 1200, 7).await?;
    let user_id = create_user(&state, "cliente2@example.com").await?;
    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };

    let session = Uuid::new_v4();
    cart_service::add_item(
        &state,
        session,
        AddToCartRequest {
            product_id: green_tea,
            quantity: 2,
        },
    )
    .await?;
    cart_service::add_item(
        &state,
        session,
        AddToCartRequest {
            product_id: mate,
            quantity: 3,
        },
    )
    .await?;

    let resp = checkout_service::checkout(
        &state,
        Some(&auth_user),
        session,
        CheckoutRequest {
            customer: customer(),
            payment_method: "boleto".into(),
        },
    )
    .await?;
    let data = resp.data.unwrap();
    let order = data.order.order;
    assert_eq!(order.status, "pending");
    assert_eq!(product_stock(&state, green_tea).await?, 7);
    assert_eq!(product_stock(&state, mate).await?, 4);

    // Line items come back in product-id order, the same order the
    // checkout locks the rows in.
    let item_ids: Vec<Uuid> = data.order.items.iter().map(|i| i.product_id).collect();
    let mut sorted = item_ids.clone();
    sorted.sort();
    assert_eq!(item_ids, sorted);

    let cancelled = order_service::cancel_my_order(
        &state,
        &auth_user,
        order.id,
        CancelOrderRequest {
            reason: CancellationReason::ChangeOfMind,
            custom_reason: None,
        },
    )
    .await?;
    assert_eq!(cancelled.data.unwrap().status, "cancelled");

    // Each product regains exactly its own line item quantity
    assert_eq!(product_stock(&state, green_tea).await?, 9);
    assert_eq!(product_stock(&state, mate).await?, 7);

    // Retrying changes nothing
    let again = order_service::cancel_my_order(
        &state,
        &auth_user,
        order.id,
        CancelOrderRequest {
            reason: CancellationReason::ChangeOfMind,
            custom_reason: None,
        },
    )
    .await;
    assert!(again.is_err());
    assert_eq!(product_stock(&state, green_tea).await?, 9);
    assert_eq!(product_stock(&state, mate).await?, 7);

    Ok(())
}

// Admin side: status transitions, restock on admin cancellation, stock
// adjustment and the dashboard aggregate.
#[tokio::test]
async fn admin_manages_orders_and_sees_dashboard() -> anyhow::Result<()> {
    let _guard = db_lock().lock().await;
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let sencha = create_product(&state, "Sencha Imperial", 3200, 10).await?;
    let admin_id = create_user(&state, "admin@example.com").await?;
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    let session = Uuid::new_v4();
    cart_service::add_item(
        &state,
        session,
        AddToCartRequest {
            product_id: sencha,
            quantity: 3,
        },
    )
    .await?;
    let resp = checkout_service::checkout(
        &state,
        None,
        session,
        CheckoutRequest {
            customer: customer(),
            payment_method: "transfer".into(),
        },
    )
    .await?;
    let order = resp.data.unwrap().order.order;
    assert_eq!(order.status, "pending");
    assert_eq!(product_stock(&state, sencha).await?, 7);

    let listed = admin_service::list_all_orders(
        &state,
        &auth_admin,
        AdminOrderQuery {
            pagination: Pagination {
                page: Some(1),
                per_page: Some(20),
            },
            status: None,
            q: Some("maria".into()),
            sort_order: None,
        },
    )
    .await?;
    assert_eq!(listed.data.unwrap().items.len(), 1);

    let updated = admin_service::update_order_status(
        &state,
        &auth_admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "paid".into(),
        },
    )
    .await?;
    let updated = updated.data.unwrap();
    assert_eq!(updated.order.status, "paid");
    assert_eq!(updated.previous_status, "pending");

    // Cancelling restores the stock
    let cancelled = admin_service::update_order_status(
        &state,
        &auth_admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?;
    assert_eq!(cancelled.data.unwrap().order.status, "cancelled");
    assert_eq!(product_stock(&state, sencha).await?, 10);

    // Cancelled is terminal
    let revived = admin_service::update_order_status(
        &state,
        &auth_admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await;
    assert!(revived.is_err());

    // Manual adjustment floors at zero
    let adjusted = product_service::adjust_stock(
        &state,
        &auth_admin,
        sencha,
        StockAdjustRequest { delta: -25 },
    )
    .await?;
    assert_eq!(adjusted.data.unwrap().new_stock, 0);

    let dashboard = admin_service::dashboard(&state, &auth_admin).await?;
    let dashboard = dashboard.data.unwrap();
    assert_eq!(dashboard.orders, 1);
    assert_eq!(dashboard.cancelled, 1);
    // Cancelled orders never count toward revenue
    assert_eq!(dashboard.revenue, 0);
    assert_eq!(dashboard.last_orders.len(), 1);
    assert_eq!(dashboard.top_products[0].product_id, sencha);

    Ok(())
}

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, stock_movements, audit_logs, password_resets, products, profiles, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let storage_root = std::env::temp_dir().join(format!("storefront-test-{}", Uuid::new_v4()));
    Ok(Some(AppState {
        pool,
        orm,
        carts: CartStore::new(),
        events: Default::default(),
        storage: Storage::new(storage_root, "http://localhost:3000/uploads"),
        shipping: ShippingConfig::default(),
        merchant: MerchantConfig::default(),
    }))
}

async fn product_stock(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok(stock)
}

async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(Some("A tea for testing".into())),
        price: Set(price),
        image: Set(None),
        category: Set("Chas".into()),
        stock: Set(stock),
        weight: Set(50),
        rating: Set(0.0),
        reviews: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

async fn create_user(state: &AppState, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        app_metadata: Set(None),
        user_metadata: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(user.id)
}
