use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{StoryError, StoryResult};
use crate::llm::media::{download_image, is_image};
use crate::llm::{GenerationMode, GenerationUnit, Generator, ImageOptions, ImageResult, TextOptions};
use crate::utils::http::get_http_client;
use crate::utils::logging::{redact_secret, truncate_for_log};
use crate::utils::timing::log_generation_timing;

const PROVIDER: &str = "openai";
const ERROR_BODY_LIMIT: usize = 2000;

/// Client for an OpenAI-compatible chat-completions and image-generation API.
/// One request per call; failures surface as `GenerationFailure`.
#[derive(Debug)]
pub struct OpenAiGenerator {
    mode: GenerationMode,
    base_url: String,
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), ERROR_BODY_LIMIT));
    }

    (None, truncate_for_log(trimmed, ERROR_BODY_LIMIT))
}

fn extract_chat_content(response: &Value) -> Option<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn finish_reason(response: &Value) -> Option<&str> {
    response
        .pointer("/choices/0/finish_reason")
        .and_then(|v| v.as_str())
}

enum ImagePayload {
    Inline(String),
    Remote(String),
}

fn extract_image_payload(response: &Value) -> Option<ImagePayload> {
    let first = response.pointer("/data/0")?;
    if let Some(encoded) = first.get("b64_json").and_then(|v| v.as_str()) {
        if !encoded.trim().is_empty() {
            return Some(ImagePayload::Inline(encoded.trim().to_string()));
        }
    }
    first
        .get("url")
        .and_then(|v| v.as_str())
        .filter(|url| !url.trim().is_empty())
        .map(|url| ImagePayload::Remote(url.trim().to_string()))
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        OpenAiGenerator {
            mode: GenerationMode::Live {
                api_key: api_key.into(),
            },
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn api_key(&self) -> &str {
        match &self.mode {
            GenerationMode::Live { api_key } => api_key,
            GenerationMode::Fixture => "",
        }
    }

    async fn post_json(&self, path: &str, payload: &Value, unit: GenerationUnit) -> StoryResult<Value> {
        debug!(
            "OpenAI request path={} model={} unit={}",
            path,
            payload.get("model").and_then(|v| v.as_str()).unwrap_or("unknown"),
            unit
        );

        let response = get_http_client()
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.api_key())
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let detail = redact_secret(&err.to_string(), self.api_key());
                warn!("OpenAI transport error for {unit}: {detail}");
                StoryError::generation(unit, format!("request failed: {detail}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            let body_summary = redact_secret(&body_summary, self.api_key());
            warn!("OpenAI API error for {unit}: status={status}, body={body_summary}");
            let detail = message.unwrap_or(body_summary);
            return Err(StoryError::generation(
                unit,
                format!("service returned status {status}: {detail}"),
            ));
        }

        response.json::<Value>().await.map_err(|err| {
            StoryError::generation(unit, format!("unreadable response body: {err}"))
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn mode(&self) -> &GenerationMode {
        &self.mode
    }

    async fn generate_text(&self, prompt: &str, options: &TextOptions) -> StoryResult<String> {
        let unit = GenerationUnit::StoryText;
        let payload = json!({
            "model": options.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "max_tokens": options.max_output_tokens,
        });
        let metadata = json!({ "prompt_chars": prompt.chars().count() });

        log_generation_timing(PROVIDER, &options.model, "chat_completion", Some(metadata), || async {
            let response = self.post_json("/chat/completions", &payload, unit).await?;
            if finish_reason(&response) == Some("length") {
                return Err(StoryError::generation(
                    unit,
                    format!(
                        "output was cut off at {} tokens",
                        options.max_output_tokens
                    ),
                ));
            }
            extract_chat_content(&response).ok_or_else(|| {
                warn!(
                    "OpenAI response had no content: {}",
                    truncate_for_log(&response.to_string(), ERROR_BODY_LIMIT)
                );
                StoryError::generation(unit, "service returned no text")
            })
        })
        .await
    }

    async fn generate_image(
        &self,
        prompt: &str,
        unit: GenerationUnit,
        options: &ImageOptions,
    ) -> StoryResult<ImageResult> {
        let payload = json!({
            "model": options.model,
            "prompt": prompt,
            "n": 1,
            "size": options.size,
            "quality": options.quality,
        });
        let metadata = json!({ "unit": unit.to_string(), "size": options.size });

        log_generation_timing(PROVIDER, &options.model, "image_generation", Some(metadata), || async {
            let response = self.post_json("/images/generations", &payload, unit).await?;
            let bytes = match extract_image_payload(&response) {
                Some(ImagePayload::Inline(encoded)) => general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|err| {
                        StoryError::generation(unit, format!("invalid base64 image: {err}"))
                    })?,
                Some(ImagePayload::Remote(url)) => download_image(&url, unit).await?,
                None => {
                    return Err(StoryError::generation(unit, "service returned no image"));
                }
            };
            if !is_image(&bytes) {
                return Err(StoryError::generation(
                    unit,
                    "service returned a payload that is not an image",
                ));
            }
            Ok(ImageResult::new(bytes))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_keeps_one_redacted_credential() {
        let generator = OpenAiGenerator::new("sk-live-secret", "https://api.example.com/v1/");
        assert_eq!(generator.api_key(), "sk-live-secret");
        assert!(!format!("{generator:?}").contains("sk-live-secret"));
    }

    #[test]
    fn error_body_prefers_service_message() {
        let (message, summary) =
            summarize_error_body(r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#);
        assert_eq!(message.as_deref(), Some("Rate limit reached"));
        assert!(summary.contains("requests"));

        let (message, summary) = summarize_error_body("   ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn image_payload_prefers_inline_data() {
        let response = json!({ "data": [{ "b64_json": "aGk=", "url": "https://x/y.png" }] });
        assert!(matches!(
            extract_image_payload(&response),
            Some(ImagePayload::Inline(ref data)) if data == "aGk="
        ));

        let response = json!({ "data": [{ "url": "https://x/y.png" }] });
        assert!(matches!(
            extract_image_payload(&response),
            Some(ImagePayload::Remote(ref url)) if url == "https://x/y.png"
        ));

        assert!(extract_image_payload(&json!({ "data": [] })).is_none());
    }

    #[test]
    fn empty_chat_content_is_not_text() {
        let response = json!({ "choices": [{ "message": { "content": "  " }, "finish_reason": "stop" }] });
        assert!(extract_chat_content(&response).is_none());
        let response = json!({ "choices": [{ "message": { "content": " Title " }, "finish_reason": "length" }] });
        assert_eq!(extract_chat_content(&response).as_deref(), Some("Title"));
        assert_eq!(finish_reason(&response), Some("length"));
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let generator = OpenAiGenerator::new("sk-test", "https://api.openai.com/v1/");
        assert_eq!(generator.base_url, "https://api.openai.com/v1");
        assert_eq!(generator.mode().label(), "live");
    }
}
