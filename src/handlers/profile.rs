use actix_web::{HttpResponse, get, post, put, web};
use serde_json::json;

use super::{AuthenticatedUser, created, ok};
use crate::error::{AppError, Result};
use crate::models::{ProfileUpdate, SkinProfile, SkinProfileData, SkinProfileUpdate};
use crate::state::AppState;
use crate::utils::database::StoreError;

fn profile_missing() -> AppError {
    AppError::NotFound("Profile not found".to_string())
}

fn skin_profile_missing() -> AppError {
    AppError::NotFound("Skin profile not found".to_string())
}

#[get("/profile")]
pub async fn get_profile(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse> {
    let profile = state
        .store
        .get_profile(user.id)
        .await?
        .ok_or_else(profile_missing)?;
    Ok(ok(json!({ "profile": profile })))
}

#[put("/profile")]
pub async fn update_profile(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<ProfileUpdate>,
) -> Result<HttpResponse> {
    let profile = state
        .store
        .update_profile(user.id, &body)
        .await?
        .ok_or_else(profile_missing)?;
    Ok(ok(json!({ "profile": profile })))
}

#[get("/skin-profile")]
pub async fn get_skin_profile(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let skin_profile = state
        .store
        .get_skin_profile(user.id)
        .await?
        .ok_or_else(skin_profile_missing)?;
    Ok(ok(json!({ "skin_profile": skin_profile })))
}

#[post("/skin-profile")]
pub async fn create_skin_profile(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<SkinProfileData>,
) -> Result<HttpResponse> {
    let skin_profile = SkinProfile::new(user.id, body.into_inner());
    let saved = state
        .store
        .create_skin_profile(&skin_profile)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => AppError::Conflict(
                "Skin profile already exists, use PUT to update it".to_string(),
            ),
            other => other.into(),
        })?;
    Ok(created(json!({ "skin_profile": saved })))
}

#[put("/skin-profile")]
pub async fn update_skin_profile(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<SkinProfileUpdate>,
) -> Result<HttpResponse> {
    let skin_profile = state
        .store
        .update_skin_profile(user.id, &body)
        .await?
        .ok_or_else(skin_profile_missing)?;
    Ok(ok(json!({ "skin_profile": skin_profile })))
}
