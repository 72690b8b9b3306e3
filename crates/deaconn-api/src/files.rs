use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use deaconn_types::api::UploadResponse;
use deaconn_types::policy::can_upload;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::ApiPath;
use crate::middleware::CurrentSession;

/// 10 MB upload limit for images
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

fn content_type_for(extension: &str) -> Option<&'static str> {
    IMAGE_TYPES
        .iter()
        .find(|(_, ext)| *ext == extension)
        .map(|(mime, _)| *mime)
}

/// Stored names are `<sha256 hex>.<ext>`; anything else is refused before
/// touching the filesystem.
fn parse_name(name: &str) -> Option<&'static str> {
    let (digest, extension) = name.split_once('.')?;
    if digest.len() != 64 || !digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    content_type_for(extension)
}

fn public_url(state: &AppState, name: &str) -> String {
    match &state.config.cdn_url {
        Some(cdn) => format!("{cdn}/{name}"),
        None => format!("/files/{name}"),
    }
}

/// POST /files. Raw image bytes; the stored name is derived from the
/// content, so identical uploads share one file.
pub async fn upload_file(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if !can_upload(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    let extension = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(extension_for)
        .ok_or_else(|| ApiError::BadRequest("only PNG, JPEG, GIF and WebP images are accepted".into()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("file is empty".into()));
    }
    if bytes.len() > MAX_UPLOAD_SIZE {
        return Err(ApiError::BadRequest("file exceeds the 10 MB limit".into()));
    }

    let name = format!("{}.{}", hex::encode(Sha256::digest(&bytes)), extension);
    let dir = &state.config.upload_dir;

    // Ensure uploads directory exists
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        error!("Failed to create upload directory {}: {}", dir.display(), e);
        ApiError::Internal(e.into())
    })?;

    let path = dir.join(&name);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        info!("Upload {} already stored", name);
    } else {
        // Write to a temp name first so a partial file is never served.
        let tmp = dir.join(format!("{name}.part"));
        let mut file = tokio::fs::File::create(&tmp).await.map_err(|e| {
            error!("Failed to create file {}: {}", tmp.display(), e);
            ApiError::Internal(e.into())
        })?;
        file.write_all(&bytes).await.map_err(|e| {
            error!("Failed to write file {}: {}", tmp.display(), e);
            ApiError::Internal(e.into())
        })?;
        file.flush().await.map_err(|e| ApiError::Internal(e.into()))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            error!("Failed to move {} into place: {}", tmp.display(), e);
            ApiError::Internal(e.into())
        })?;
        info!("Stored upload {} ({} bytes) from {}", name, bytes.len(), session.user_id);
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: public_url(&state, &name),
            name,
            size: bytes.len() as u64,
        }),
    ))
}

/// GET /files/{name}
pub async fn serve_file(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate the name to prevent path traversal
    let content_type = parse_name(&name).ok_or(ApiError::NotFound("File"))?;

    let path = state.config.upload_dir.join(&name);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ApiError::NotFound("File"),
        _ => ApiError::Internal(anyhow::anyhow!("failed to read {}: {}", path.display(), e)),
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(extension_for("image/svg+xml"), None);
        assert_eq!(extension_for("application/octet-stream"), None);
    }

    #[test]
    fn stored_names_are_validated() {
        let digest = "a".repeat(64);
        assert_eq!(parse_name(&format!("{digest}.png")), Some("image/png"));
        assert_eq!(parse_name(&format!("{digest}.exe")), None);
        assert_eq!(parse_name("../../etc/passwd"), None);
        assert_eq!(parse_name(&format!("{}.png", "A".repeat(64))), None);
        assert_eq!(parse_name("abc.png"), None);
    }
}
