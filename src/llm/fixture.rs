use async_trait::async_trait;
use tracing::debug;

use crate::error::{StoryError, StoryResult};
use crate::llm::{GenerationMode, GenerationUnit, Generator, ImageOptions, ImageResult, TextOptions};

pub const FIXTURE_STORY: &str = include_str!("../../fixtures/story.txt");

const CHAPTER_IMAGES: [&[u8]; 5] = [
    include_bytes!("../../fixtures/images/chapter_1.png"),
    include_bytes!("../../fixtures/images/chapter_2.png"),
    include_bytes!("../../fixtures/images/chapter_3.png"),
    include_bytes!("../../fixtures/images/chapter_4.png"),
    include_bytes!("../../fixtures/images/chapter_5.png"),
];

const PROFILE_IMAGE: &[u8] = include_bytes!("../../fixtures/images/profile.png");

/// Canned output for offline runs and tests. Prompts are ignored; chapter
/// images cycle over the bundled set by 1-based chapter number.
#[derive(Debug)]
pub struct FixtureGenerator {
    mode: GenerationMode,
}

impl FixtureGenerator {
    pub fn new() -> Self {
        FixtureGenerator {
            mode: GenerationMode::Fixture,
        }
    }

    pub fn image_for(unit: GenerationUnit) -> StoryResult<&'static [u8]> {
        match unit {
            GenerationUnit::Chapter(number) => {
                let slot = number.saturating_sub(1) % CHAPTER_IMAGES.len();
                Ok(CHAPTER_IMAGES[slot])
            }
            GenerationUnit::Profile => Ok(PROFILE_IMAGE),
            GenerationUnit::StoryText => Err(StoryError::generation(
                unit,
                "no fixture image exists for story text",
            )),
        }
    }
}

impl Default for FixtureGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for FixtureGenerator {
    fn mode(&self) -> &GenerationMode {
        &self.mode
    }

    async fn generate_text(&self, prompt: &str, _options: &TextOptions) -> StoryResult<String> {
        debug!("Serving fixture story for prompt of {} chars", prompt.chars().count());
        Ok(FIXTURE_STORY.to_string())
    }

    async fn generate_image(
        &self,
        _prompt: &str,
        unit: GenerationUnit,
        _options: &ImageOptions,
    ) -> StoryResult<ImageResult> {
        let bytes = Self::image_for(unit)?;
        debug!("Serving fixture image for {unit}");
        Ok(ImageResult::new(bytes.to_vec()))
    }
}
