//! HTTP routes.

use actix_multipart::form::MultipartFormConfig;
use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::error::AppError;

pub mod analysis;
pub mod auth;
pub mod extract;
pub mod health;
pub mod images;
pub mod profile;

pub use extract::AuthenticatedUser;

/// Headroom above the configured upload cap for multipart framing, so that
/// oversized files reach the handler and get a proper 413.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// `{ "success": true, ...data }`
#[derive(Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Success {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(Success {
        success: true,
        data,
    })
}

/// Register every route plus the body extractor settings.
pub fn configure(max_file_size: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(
            web::JsonConfig::default()
                .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
        )
        .app_data(
            MultipartFormConfig::default()
                .total_limit(max_file_size + MULTIPART_OVERHEAD)
                .memory_limit(max_file_size + MULTIPART_OVERHEAD)
                .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
        )
        .service(health::root)
        .service(health::health)
        .service(
            web::scope("/auth")
                .service(auth::sign_up)
                .service(auth::sign_in)
                .service(auth::sign_out)
                .service(auth::reset_password)
                .service(auth::me),
        )
        .service(profile::get_profile)
        .service(profile::update_profile)
        .service(profile::get_skin_profile)
        .service(profile::create_skin_profile)
        .service(profile::update_skin_profile)
        .service(images::list_images)
        .service(images::upload_image)
        .service(images::delete_image)
        .service(analysis::analyze_user)
        .service(analysis::analyze_skin)
        .service(analysis::search_products)
        .service(analysis::generate_routine);
    }
}
