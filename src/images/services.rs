use anyhow::Context;
use axum::http::HeaderMap;
use bytes::Bytes;
use rand::Rng;
use time::OffsetDateTime;

use crate::{error::ApiError, state::AppState};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

pub struct UploadItem<'a> {
    pub body: Bytes,
    pub content_type: &'a str,
    pub file_name: Option<&'a str>,
}

pub fn check_content_type(content_type: &str) -> Result<(), ApiError> {
    if ALLOWED_CONTENT_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(ApiError::invalid_message(
            "Invalid file type. Only JPEG, PNG and GIF are allowed.",
        ))
    }
}

pub fn check_size(len: usize) -> Result<(), ApiError> {
    if len <= MAX_IMAGE_BYTES {
        Ok(())
    } else {
        Err(ApiError::invalid_message("File too large. Maximum size is 5MB."))
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Filename extensions accepted as-is for each allowed MIME type.
fn known_extensions(ct: &str) -> &'static [&'static str] {
    match ct {
        "image/jpeg" | "image/jpg" => &["jpg", "jpeg"],
        "image/png" => &["png"],
        "image/gif" => &["gif"],
        _ => &[],
    }
}

/// Extension of the client's filename (lower-cased) when it agrees with the MIME type,
/// otherwise the MIME type's own extension. Stored files are always served as images.
fn extension_for(file_name: Option<&str>, content_type: &str) -> String {
    let from_name = file_name
        .and_then(|n| n.rsplit_once('.'))
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| known_extensions(content_type).contains(&ext.as_str()));

    match from_name.or_else(|| ext_from_mime(content_type).map(str::to_string)) {
        Some(ext) => format!(".{}", ext),
        None => String::new(),
    }
}

/// `<unix-millis>-<random>` plus the client's extension when it matches the MIME type.
pub fn generate_file_name(file_name: Option<&str>, content_type: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}{}", millis, suffix, extension_for(file_name, content_type))
}

/// `scheme://host` of the incoming request, honouring a proxy's `X-Forwarded-Proto`.
pub fn public_base_url(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let scheme = header("x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .unwrap_or("http");
    let host = header("host").unwrap_or("localhost");
    format!("{}://{}", scheme, host)
}

/// Validates and stores one image, returning its public URL.
pub async fn store_image(
    st: &AppState,
    base_url: &str,
    item: UploadItem<'_>,
) -> Result<String, ApiError> {
    check_content_type(item.content_type)?;
    check_size(item.body.len())?;

    let key = generate_file_name(item.file_name, item.content_type);
    st.storage
        .put_object(&key, item.body, item.content_type)
        .await
        .with_context(|| format!("store image {}", key))
        .map_err(|e| st.internal(e))?;
    Ok(st.storage.public_url(base_url, &key))
}
