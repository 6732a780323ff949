use actix_multipart::form::MultipartForm;
use actix_web::{HttpResponse, post, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::images::{UploadForm, validate_upload};
use super::{AuthenticatedUser, ok};
use crate::analysis::products::{self, Product};
use crate::analysis::routine;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub image_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RoutineRequest {
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
}

/// An empty body means "newest image"; anything else must be a valid request.
fn parse_analysis_request(body: &[u8]) -> Result<AnalysisRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AnalysisRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}

/// Full pipeline over one of the caller's stored images.
#[post("/analysis")]
pub async fn analyze_user(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let request = parse_analysis_request(&body)?;
    let analysis = state
        .analysis
        .analyze_user(user.id, request.image_id)
        .await?;
    Ok(ok(json!({ "analysis": analysis })))
}

/// Diagnose an uploaded image without storing it.
#[post("/analyze-skin")]
pub async fn analyze_skin(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<UploadForm>,
) -> Result<HttpResponse> {
    let upload = validate_upload(form.file, state.config.max_file_size)?;
    info!("Analyzing uploaded image {}", upload.file_name);

    let result = state.analysis.analyze_image(&upload.bytes, None).await?;
    Ok(ok(json!({
        "analysis": result.ai_analysis,
        "product_recommendations": result.product_recommendations,
        "personalized_routine": result.personalized_routine,
    })))
}

#[post("/search-products")]
pub async fn search_products(
    state: web::Data<AppState>,
    body: web::Json<Vec<String>>,
) -> Result<HttpResponse> {
    let conditions: Vec<String> = body
        .into_inner()
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if conditions.is_empty() {
        return Err(AppError::BadRequest(
            "At least one condition is required".to_string(),
        ));
    }

    let results = products::products_for_conditions(
        state.analysis.search(),
        &conditions,
        state.analysis.max_results(),
    )
    .await;

    Ok(ok(json!({
        "conditions_searched": conditions,
        "products": results.products,
        "total_found": results.total_found,
        "source": results.source,
    })))
}

#[post("/generate-routine")]
pub async fn generate_routine(body: web::Json<RoutineRequest>) -> Result<HttpResponse> {
    let request = body.into_inner();
    let routine = routine::generate_routine(&request.products, &request.key_ingredients, None);
    Ok(ok(json!({
        "conditions": request.conditions,
        "routine": routine,
    })))
}
