use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::admin::{ProfileList, ProfileView, UpdateProfileRequest},
    entity::profiles::{ActiveModel, Column, Entity as Profiles},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Profile,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Back-office customer list: profile joined with the account email.
pub async fn list_profiles(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ProfileList>> {
    ensure_admin(user)?;
    let rows = Profiles::find()
        .find_also_related(crate::entity::users::Entity)
        .order_by_asc(Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .map(|(profile, account)| ProfileView {
            profile: Profile {
                id: profile.id,
                full_name: profile.full_name,
                created_at: profile.created_at.with_timezone(&Utc),
            },
            email: account.map(|u| u.email).unwrap_or_default(),
        })
        .collect();

    Ok(ApiResponse::success(
        "Profiles",
        ProfileList { items },
        Some(Meta::empty()),
    ))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<Profile>> {
    ensure_admin(user)?;
    let existing = Profiles::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(full_name) = payload.full_name {
        let trimmed = full_name.trim();
        active.full_name = Set(if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        });
    }
    let profile = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "profile_update",
        Some("profiles"),
        Some(serde_json::json!({ "profile_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Profile updated",
        Profile {
            id: profile.id,
            full_name: profile.full_name,
            created_at: profile.created_at.with_timezone(&Utc),
        },
        Some(Meta::empty()),
    ))
}
