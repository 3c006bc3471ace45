pub mod fixture;
pub mod media;
pub mod openai;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{StoryError, StoryResult};

pub use fixture::FixtureGenerator;
pub use openai::OpenAiGenerator;

/// Which piece of work a generation call belongs to. Carried by failures so
/// logs and stored job errors say what broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationUnit {
    StoryText,
    Chapter(usize),
    Profile,
}

impl fmt::Display for GenerationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationUnit::StoryText => f.write_str("story text"),
            GenerationUnit::Chapter(index) => write!(f, "chapter {index}"),
            GenerationUnit::Profile => f.write_str("profile image"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum GenerationMode {
    Live { api_key: String },
    Fixture,
}

impl fmt::Debug for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Live { .. } => f
                .debug_struct("Live")
                .field("api_key", &"[redacted]")
                .finish(),
            GenerationMode::Fixture => f.write_str("Fixture"),
        }
    }
}

impl GenerationMode {
    /// Live generation needs the flag, a credential and a non-test profile.
    /// Asking for live output without a credential is a configuration error,
    /// never a silent switch to fixtures.
    pub fn resolve(
        live_requested: bool,
        api_key: &str,
        test_profile: bool,
    ) -> StoryResult<GenerationMode> {
        if test_profile {
            return Ok(GenerationMode::Fixture);
        }
        if !live_requested {
            return Ok(GenerationMode::Fixture);
        }
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(StoryError::Configuration(
                "OPENAI_GENERATE is enabled but OPENAI_API_KEY is not set".to_string(),
            ));
        }
        Ok(GenerationMode::Live {
            api_key: api_key.to_string(),
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            GenerationMode::Live { .. } => "live",
            GenerationMode::Fixture => "fixture",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOptions {
    pub model: String,
    pub max_output_tokens: u32,
}

impl Default for TextOptions {
    fn default() -> Self {
        TextOptions {
            model: "gpt-4o-mini".to_string(),
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    pub model: String,
    pub size: String,
    pub quality: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        ImageOptions {
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageResult {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime_type =
            media::detect_mime_type(&bytes).unwrap_or_else(|| "application/octet-stream".to_string());
        ImageResult { bytes, mime_type }
    }

    /// Base64 form stored on chapter rows and returned in payloads.
    pub fn encoded(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn mode(&self) -> &GenerationMode;

    async fn generate_text(&self, prompt: &str, options: &TextOptions) -> StoryResult<String>;

    async fn generate_image(
        &self,
        prompt: &str,
        unit: GenerationUnit,
        options: &ImageOptions,
    ) -> StoryResult<ImageResult>;
}

pub fn build_generator(mode: GenerationMode, base_url: &str) -> Arc<dyn Generator> {
    match mode {
        GenerationMode::Live { api_key } => Arc::new(OpenAiGenerator::new(api_key, base_url)),
        GenerationMode::Fixture => Arc::new(FixtureGenerator::new()),
    }
}

/// Bounds one generation call; an elapsed deadline is a failure of `unit`.
pub async fn bounded<T, F>(unit: GenerationUnit, limit: Duration, call: F) -> StoryResult<T>
where
    F: Future<Output = StoryResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoryError::generation(
            unit,
            format!("timed out after {:.1}s", limit.as_secs_f64()),
        )),
    }
}

/// Starts an image generation on the runtime right away and hands back the
/// join handle; awaiting the handle is the only suspension point.
pub fn spawn_image_generation(
    generator: Arc<dyn Generator>,
    prompt: String,
    unit: GenerationUnit,
    options: ImageOptions,
    limit: Duration,
) -> JoinHandle<StoryResult<ImageResult>> {
    tokio::spawn(async move {
        bounded(unit, limit, generator.generate_image(&prompt, unit, &options)).await
    })
}
