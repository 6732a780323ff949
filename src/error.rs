//! Errors returned by HTTP handlers and their JSON rendering.

use actix_web::http::StatusCode;
use actix_web::http::header;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::analysis::service::{AnalysisError, AnalysisStep};
use crate::utils::auth::SupabaseError;
use crate::utils::database::StoreError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Auth(#[from] SupabaseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    step_failed: Option<&'a str>,
}

impl AppError {
    /// Machine readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::UnsupportedMediaType(_) => "unsupported_media_type",
            AppError::Analysis(_) => "analysis_failed",
            AppError::Auth(SupabaseError::Rejected { .. }) => "auth_rejected",
            AppError::Auth(SupabaseError::InvalidToken(_)) => "unauthorized",
            AppError::Auth(_) => "auth_unavailable",
            AppError::Store(StoreError::Conflict(_)) => "conflict",
            AppError::Store(StoreError::NotFound(_)) => "not_found",
            AppError::Store(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Analysis(e) => match e.step {
                AnalysisStep::FetchProfile | AnalysisStep::FetchImages | AnalysisStep::SelectImage => {
                    StatusCode::NOT_FOUND
                }
                AnalysisStep::DownloadImage | AnalysisStep::AiAnalysis => StatusCode::BAD_GATEWAY,
            },
            // Client errors from the identity service are passed through as-is.
            AppError::Auth(SupabaseError::Rejected { status, .. }) => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::Auth(SupabaseError::InvalidToken(_)) => StatusCode::UNAUTHORIZED,
            AppError::Auth(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed with {}: {}", status, self);
        }

        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            code: self.code(),
            step_failed: match self {
                AppError::Analysis(e) => Some(e.step.as_str()),
                _ => None,
            },
        };

        let mut response = HttpResponse::build(status);
        if status == StatusCode::UNAUTHORIZED {
            response.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        response.json(body)
    }
}
