use tracing::warn;

use crate::error::{StoryError, StoryResult};
use crate::llm::GenerationUnit;
use crate::utils::http::get_http_client;
use crate::utils::logging::truncate_for_log;

const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn is_image(data: &[u8]) -> bool {
    detect_mime_type(data)
        .map(|mime| mime.starts_with("image/"))
        .unwrap_or(false)
}

/// Fetches a generated image referenced by URL. Single attempt; any failure
/// is reported against `unit`.
pub async fn download_image(url: &str, unit: GenerationUnit) -> StoryResult<Vec<u8>> {
    let client = get_http_client();
    let response = client.get(url).send().await.map_err(|err| {
        warn!(
            "Failed to fetch image for {unit}: {err} (timeout={}, connect={})",
            err.is_timeout(),
            err.is_connect()
        );
        StoryError::generation(unit, format!("image download failed: {err}"))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(
            "Image download for {unit} failed with status {}: {}",
            status,
            truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
        );
        return Err(StoryError::generation(
            unit,
            format!("image download failed with status {status}"),
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| StoryError::generation(unit, format!("failed to read image bytes: {err}")))?;
    if bytes.is_empty() {
        return Err(StoryError::generation(unit, "image download returned no bytes"));
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_png_and_rejects_text() {
        let png = crate::llm::fixture::FixtureGenerator::image_for(GenerationUnit::Profile).unwrap();
        assert_eq!(detect_mime_type(png).as_deref(), Some("image/png"));
        assert!(is_image(png));
        assert!(!is_image(b"{\"error\":\"nope\"}"));
    }
}
