use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, web};
use futures::future::LocalBoxFuture;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// The caller, identified by a verified `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub token: String,
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let state =
                state.ok_or_else(|| AppError::Internal("Application state missing".to_string()))?;
            let token = token.ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

            let user = state.verifier.verify(&token).await.map_err(|e| {
                debug!("Rejected bearer token: {}", e);
                AppError::Unauthorized("Could not validate credentials".to_string())
            })?;

            Ok(AuthenticatedUser {
                id: user.id,
                email: user.email,
                token,
            })
        })
    }
}
