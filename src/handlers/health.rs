use actix_web::{HttpResponse, get, web};
use serde_json::json;

use crate::config::StoreBackend;
use crate::state::AppState;

#[get("/")]
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Dermalens Skin Analysis API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness plus which collaborators are switched on.
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let config = &state.config;
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "store": match config.store_backend {
            StoreBackend::Supabase => "supabase",
            StoreBackend::Sqlite => "sqlite",
        },
        "vision_enabled": config.vision_enabled(),
        "search_enabled": config.search_enabled(),
        "vision_model": config.openai_model,
    }))
}
