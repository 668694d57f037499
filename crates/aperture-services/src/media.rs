//! Local platform collaborators: the image file probe and the
//! connectivity check. Image pickers and the camera are platform UI;
//! callers hand this layer a local file path.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use aperture_core::Error;

/// Largest image accepted for upload.
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_EXTENSION: &str = "jpeg";

/// Lowercased file extension, restricted to the formats the posts bucket
/// accepts. Anything else, or no extension at all, falls back to jpeg.
pub fn image_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
                ext
            } else {
                DEFAULT_EXTENSION.to_string()
            }
        }
        None => DEFAULT_EXTENSION.to_string(),
    }
}

pub fn image_content_type(ext: &str) -> String {
    mime_guess::from_ext(ext)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "image/jpeg".to_string())
}

/// Check that `path` names a readable, non-empty file no larger than the
/// upload ceiling. Returns the size. Runs before any remote call, and its
/// failures are always validation errors, never remote ones.
pub async fn probe_image(path: &Path) -> Result<u64, Error> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| Error::validation("image file is inaccessible"))?;
    if !meta.is_file() {
        return Err(Error::validation("image file is inaccessible"));
    }
    let len = meta.len();
    if len == 0 {
        return Err(Error::validation("image file is empty"));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(Error::validation("image is too large"));
    }
    Ok(len)
}

/// Pre-flight connectivity check. Answered without error: any probe
/// failure reads as offline.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// HEAD-request probe against a known-reachable URL.
pub struct HttpProbe {
    http: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_connected(&self) -> bool {
        match self
            .http
            .head(&self.url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Probe that always reports online, for platforms that gate connectivity
/// elsewhere.
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn is_connected(&self) -> bool {
        true
    }
}
