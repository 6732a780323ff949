use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{AuthenticatedUser, created, ok};
use crate::error::{AppError, Result};
use crate::models::Profile;
use crate::state::AppState;
use crate::utils::database::StoreError;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Only catches obviously broken input; the identity service has the final say.
fn validate_email(email: &str) -> Result<()> {
    let valid = email
        .trim()
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid email address".to_string()))
    }
}

/// Register with the identity service and create the matching profile row.
#[post("/signup")]
pub async fn sign_up(
    state: web::Data<AppState>,
    body: web::Json<SignUpRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    validate_email(&request.email)?;
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let signup = state
        .auth
        .sign_up(&request.email, &request.password, request.username.as_deref())
        .await?;

    let profile = Profile::new(signup.user.id, request.email.clone(), request.username);
    match state.store.create_profile(&profile).await {
        Ok(_) => info!("Created profile for {}", profile.id),
        Err(StoreError::Conflict(_)) => {}
        Err(e) => warn!("Signed up {} but profile creation failed: {}", profile.id, e),
    }

    Ok(created(json!({
        "message": "User created successfully. Please check your email for verification.",
        "user": { "id": signup.user.id, "email": signup.user.email },
        "session": signup.session,
    })))
}

#[post("/signin")]
pub async fn sign_in(
    state: web::Data<AppState>,
    body: web::Json<SignInRequest>,
) -> Result<HttpResponse> {
    validate_email(&body.email)?;
    let session = state.auth.sign_in(&body.email, &body.password).await?;

    Ok(ok(json!({
        "access_token": session.access_token,
        "token_type": session.token_type,
        "expires_in": session.expires_in,
        "refresh_token": session.refresh_token,
        "user": session.user,
    })))
}

#[post("/signout")]
pub async fn sign_out(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse> {
    state.auth.sign_out(&user.token).await?;
    Ok(ok(json!({ "message": "Signed out successfully" })))
}

#[post("/reset-password")]
pub async fn reset_password(
    state: web::Data<AppState>,
    body: web::Json<PasswordResetRequest>,
) -> Result<HttpResponse> {
    validate_email(&body.email)?;
    state.auth.reset_password(&body.email).await?;
    Ok(ok(json!({ "message": "Password reset email sent" })))
}

#[get("/me")]
pub async fn me(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse> {
    let profile = state.store.get_profile(user.id).await?;
    Ok(ok(json!({
        "user": { "id": user.id, "email": user.email },
        "profile": profile,
    })))
}
