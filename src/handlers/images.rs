use actix_multipart::form::MultipartForm;
use actix_multipart::form::bytes::Bytes;
use actix_web::{HttpResponse, delete, get, post, web};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{AuthenticatedUser, created, ok};
use crate::error::{AppError, Result};
use crate::models::NewImage;
use crate::state::AppState;

const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// A multipart body carrying a single `file` part.
#[derive(MultipartForm)]
pub struct UploadForm {
    pub file: Bytes,
}

/// A file that passed the size and type checks.
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Check an uploaded part against the size cap and the accepted image types.
pub fn validate_upload(file: Bytes, max_file_size: usize) -> Result<Upload> {
    if file.data.len() > max_file_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File too large. Maximum size is {} bytes",
            max_file_size
        )));
    }
    if file.data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }

    let content_type = file
        .content_type
        .as_ref()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::UnsupportedMediaType(
            "Invalid file type. Only JPEG and PNG images are allowed".to_string(),
        ));
    }

    Ok(Upload {
        file_name: file.file_name.unwrap_or_else(|| "upload".to_string()),
        content_type,
        bytes: file.data.to_vec(),
    })
}

#[get("/images")]
pub async fn list_images(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse> {
    let images = state.store.list_images(user.id).await?;
    Ok(ok(json!({ "images": images })))
}

#[post("/images")]
pub async fn upload_image(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    MultipartForm(form): MultipartForm<UploadForm>,
) -> Result<HttpResponse> {
    let upload = validate_upload(form.file, state.config.max_file_size)?;

    let image = state
        .store
        .save_image(NewImage {
            user_id: user.id,
            bucket: state.config.image_bucket.clone(),
            file_name: upload.file_name,
            content_type: upload.content_type,
            bytes: upload.bytes,
        })
        .await?;
    info!("Stored image {} for {}", image.storage_path, user.id);

    Ok(created(json!({
        "message": "Image uploaded successfully",
        "image": image,
    })))
}

#[delete("/images/{id}")]
pub async fn delete_image(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let image_id = path.into_inner();
    if !state.store.delete_image(user.id, image_id).await? {
        return Err(AppError::NotFound("Image not found".to_string()));
    }
    Ok(ok(json!({ "message": "Image deleted successfully" })))
}
