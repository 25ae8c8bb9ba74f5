use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use serde_json::json;
use tea_storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_account(&pool, "admin@example.com", "admin123", "admin").await?;
    let user_id = ensure_account(&pool, "user@example.com", "user123", "user").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_account(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let app_metadata = json!({ "role": role });
    let user_metadata = json!({ "name": email.split('@').next().unwrap_or(email) });

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, app_metadata, user_metadata)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET app_metadata = EXCLUDED.app_metadata
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(&app_metadata)
    .bind(&user_metadata)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    sqlx::query(
        r#"
        INSERT INTO profiles (id, full_name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(email.split('@').next().unwrap_or(email))
    .execute(pool)
    .await?;

    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let teas = [
        (
            "Pai Mu Tan",
            "Delicate white tea with notes of melon and fresh hay.",
            2500_i64,
            "Cha Branco",
            12,
            50,
            4.8_f64,
            34,
        ),
        (
            "Camomila Premium",
            "Whole chamomile flowers for a calming golden infusion.",
            1000,
            "Infusoes",
            20,
            40,
            4.6,
            21,
        ),
        (
            "Hibisco Organico",
            "Tart hibiscus petals, deep ruby liquor, caffeine free.",
            1500,
            "Infusoes",
            8,
            60,
            4.4,
            17,
        ),
        (
            "Sencha Imperial",
            "Steamed Japanese green tea, grassy and sweet.",
            3200,
            "Cha Verde",
            4,
            80,
            4.9,
            52,
        ),
    ];

    for (name, description, price, category, stock, weight, rating, reviews) in teas {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, category, stock, weight, rating, reviews)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(category)
        .bind(stock)
        .bind(weight)
        .bind(rating)
        .bind(reviews)
        .execute(pool)
        .await?;
    }

    println!("Seeded {} teas", teas.len());
    Ok(())
}
