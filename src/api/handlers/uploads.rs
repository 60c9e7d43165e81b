use crate::api::error::AppError;
use axum::{Json, extract::Multipart, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub url: String,
}

/// Keep only the final path component and replace awkward characters so
/// the storage key stays URL-safe.
fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("upload");

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}

#[utoipa::path(
    post,
    path = "/uploads",
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Missing file, not an image, or too large"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "uploads"
)]
pub async fn upload_image(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut selected = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.file_name().is_some() {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_default();
            if !content_type.starts_with("image/") {
                return Err(AppError::BadRequest(
                    "Not an image! Please upload an image.".to_string(),
                ));
            }

            let filename = sanitize_filename(field.file_name().unwrap_or("upload"));

            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;

            selected = Some((content_type, filename, data));
            break;
        }
    }

    let (content_type, filename, data) =
        selected.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    if data.len() > state.config.max_upload_size {
        return Err(AppError::BadRequest(format!(
            "Image exceeds the {} MB limit",
            state.config.max_upload_size / 1024 / 1024
        )));
    }

    let key = format!("{}-{}", chrono::Utc::now().timestamp_millis(), filename);

    let url = state
        .storage
        .upload_image(&key, data.to_vec(), &content_type)
        .await
        .map_err(|e| AppError::Internal(format!("Upload failed: {e}")))?;

    Ok(Json(UploadResponse {
        message: "Image uploaded successfully".to_string(),
        url,
    }))
}
