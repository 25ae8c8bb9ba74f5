use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::auth::{
        AdminSetupRequest, Claims, ForgotPasswordRequest, LoginRequest, LoginResponse,
        RegisterRequest, ResetPasswordRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{Role, derive_role},
    models::User,
    notify,
    response::{ApiResponse, Meta},
};

/// Internal row carrying the credential and metadata columns the public
/// `User` model never exposes.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    app_metadata: Option<Value>,
    user_metadata: Option<Value>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn role(&self) -> Role {
        derive_role(self.app_metadata.as_ref(), self.user_metadata.as_ref())
    }

    fn public(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// Ordered candidate extractors for a display name: metadata keys in
/// priority order, first non-empty trimmed string wins, otherwise the
/// local part of the email address.
pub fn resolve_display_name(metadata: Option<&Value>, email: &str) -> String {
    const CANDIDATES: [&str; 3] = ["name", "full_name", "display_name"];
    if let Some(bag) = metadata {
        for key in CANDIDATES {
            if let Some(value) = bag.get(key).and_then(Value::as_str) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }
    email.split('@').next().unwrap_or(email).to_string()
}

pub async fn register_user(
    pool: &DbPool,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        email,
        password,
        name,
    } = payload;
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let password_hash = hash_password(&password)?;
    let user_metadata = name
        .as_deref()
        .map(|n| serde_json::json!({ "name": n }));

    let id = Uuid::new_v4();
    let user = create_user(pool, id, &email, &password_hash, None, user_metadata).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
    Ok(ApiResponse::success("User created", user, None))
}

pub async fn login_user(
    pool: &DbPool,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = fetch_user_by_email(pool, &email).await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    verify_password(&password, &user.password_hash)?;

    let token = issue_token(user.id, user.role())?;
    let resp = LoginResponse { token };

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn forgot_password(
    pool: &DbPool,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    // Reply identically whether or not the account exists.
    if let Some(user) = fetch_user_by_email(pool, &payload.email).await? {
        let token = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::hours(1);
        sqlx::query(
            "INSERT INTO password_resets (id, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token)
        .bind(user.id)
        .bind(expires_at)
        .execute(pool)
        .await?;
        notify::spawn_password_reset_email(user.email.clone(), token);
    }

    Ok(ApiResponse::empty(
        "If the email exists, a reset link was sent",
    ))
}

pub async fn reset_password(
    pool: &DbPool,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE password_resets
        SET used = TRUE
        WHERE id = $1 AND NOT used AND expires_at > now()
        RETURNING user_id
        "#,
    )
    .bind(payload.token)
    .fetch_optional(pool)
    .await?;

    let (user_id,) = match row {
        Some(row) => row,
        None => return Err(AppError::BadRequest("Invalid or expired token".into())),
    };

    let password_hash = hash_password(&payload.password)?;
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user_id),
        "password_reset",
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::empty("Password updated"))
}

/// Create-or-elevate an admin account. Gated by a bootstrap secret so the
/// endpoint is useless without deployment knowledge; the elevated role is
/// written into the app-controlled metadata bag.
pub async fn admin_setup(
    pool: &DbPool,
    payload: AdminSetupRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let expected = std::env::var("ADMIN_BOOTSTRAP_SECRET")
        .map_err(|_| AppError::Forbidden)?;
    if expected.is_empty() || payload.secret.trim() != expected {
        return Err(AppError::Forbidden);
    }

    let user = match fetch_user_by_email(pool, &payload.email).await? {
        Some(existing) => {
            verify_password(&payload.password, &existing.password_hash)?;
            existing
        }
        None => {
            let password_hash = hash_password(&payload.password)?;
            let id = Uuid::new_v4();
            let metadata = serde_json::json!({ "name": "Administrator" });
            create_user(pool, id, &payload.email, &password_hash, None, Some(metadata)).await?;
            fetch_user_by_email(pool, &payload.email)
                .await?
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("bootstrap user vanished")))?
        }
    };

    sqlx::query(
        r#"
        UPDATE users
        SET app_metadata = COALESCE(app_metadata, '{}'::jsonb) || '{"role": "admin"}'::jsonb
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .execute(pool)
    .await?;

    let token = issue_token(user.id, Role::Admin)?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "admin_bootstrap",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Admin account ready",
        LoginResponse { token },
        Some(Meta::empty()),
    ))
}

async fn fetch_user_by_email(pool: &DbPool, email: &str) -> AppResult<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash, app_metadata, user_metadata, created_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

async fn create_user(
    pool: &DbPool,
    id: Uuid,
    email: &str,
    password_hash: &str,
    app_metadata: Option<Value>,
    user_metadata: Option<Value>,
) -> AppResult<User> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (id, email, password_hash, app_metadata, user_metadata)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, password_hash, app_metadata, user_metadata, created_at
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(password_hash)
    .bind(app_metadata)
    .bind(user_metadata.clone())
    .fetch_one(pool)
    .await?;

    let full_name = resolve_display_name(user_metadata.as_ref(), email);
    sqlx::query("INSERT INTO profiles (id, full_name) VALUES ($1, $2)")
        .bind(id)
        .bind(full_name)
        .execute(pool)
        .await?;

    Ok(user.public())
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored_hash: &str) -> AppResult<()> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }
    Ok(())
}

fn issue_token(user_id: Uuid, role: Role) -> AppResult<String> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(format!("Bearer {}", token))
}

#[cfg(test)]
mod tests {
    use super::resolve_display_name;
    use serde_json::json;

    #[test]
    fn display_name_prefers_ordered_candidates() {
        let bag = json!({ "full_name": "Maria Silva", "name": "Maria" });
        assert_eq!(resolve_display_name(Some(&bag), "m@example.com"), "Maria");

        let bag = json!({ "full_name": "  Maria Silva  " });
        assert_eq!(
            resolve_display_name(Some(&bag), "m@example.com"),
            "Maria Silva"
        );
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        let bag = json!({ "name": "   " });
        assert_eq!(
            resolve_display_name(Some(&bag), "maria.silva@example.com"),
            "maria.silva"
        );
        assert_eq!(resolve_display_name(None, "guest@example.com"), "guest");
    }
}
