use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::StoryResult;
use crate::llm::{bounded, GenerationUnit, Generator, ImageOptions, ImageResult, TextOptions};
use crate::prompts::{profile_image_prompt, story_prompt};
use crate::story::illustrate::illustrate_chapters;
use crate::story::models::{StoryDraft, StoryPayload, StoryRequest};
use crate::story::parser;
use crate::story::store::{ProfileStore, StoryStore};
use crate::utils::timing::StageTimer;

/// Turns a story request into a persisted, illustrated story.
///
/// The generation mode is whatever the injected generator was built with, so
/// one pipeline never mixes live and fixture output. The pipeline does not
/// know whether it runs inline or from the job worker.
#[derive(Clone)]
pub struct StoryPipeline {
    generator: Arc<dyn Generator>,
    profiles: Arc<dyn ProfileStore>,
    stories: Arc<dyn StoryStore>,
    text_options: TextOptions,
    image_options: ImageOptions,
    timeout: Duration,
}

impl StoryPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        profiles: Arc<dyn ProfileStore>,
        stories: Arc<dyn StoryStore>,
    ) -> Self {
        StoryPipeline {
            generator,
            profiles,
            stories,
            text_options: TextOptions::default(),
            image_options: ImageOptions::default(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_text_options(mut self, options: TextOptions) -> Self {
        self.text_options = options;
        self
    }

    pub fn with_image_options(mut self, options: ImageOptions) -> Self {
        self.image_options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mode_label(&self) -> &'static str {
        self.generator.mode().label()
    }

    pub async fn generate_story(&self, request: &StoryRequest) -> StoryResult<StoryPayload> {
        let timer = StageTimer::start("generate_story", request.child_id.as_str());
        let result = self.run_story(request).await;
        match &result {
            Ok(payload) => {
                info!(
                    "Story {} created for child {} with {} chapters ({} mode)",
                    payload.story_id,
                    request.child_id,
                    payload.chapter_titles.len(),
                    self.mode_label()
                );
                timer.finish("success");
            }
            Err(err) => {
                warn!("Story generation for child {} failed: {err}", request.child_id);
                timer.finish(err.kind());
            }
        }
        result
    }

    async fn run_story(&self, request: &StoryRequest) -> StoryResult<StoryPayload> {
        let profile = self
            .profiles
            .profile_parameters(&request.child_id)
            .await?
            .to_prompt_parameters();

        let prompt = story_prompt(&profile, &request.topic, request.story_genre)?;
        let raw = bounded(
            GenerationUnit::StoryText,
            self.timeout,
            self.generator.generate_text(&prompt, &self.text_options),
        )
        .await?;

        let story = parser::extract(raw.trim())?;
        info!(
            "Extracted story '{}' with {} chapters",
            story.title,
            story.chapters.len()
        );

        let images = illustrate_chapters(
            Arc::clone(&self.generator),
            &story.chapters,
            &profile,
            request.image_style,
            &self.image_options,
            self.timeout,
        )
        .await?;

        let draft = StoryDraft::new(request, story, &images);
        let record = self.stories.create_story_with_chapters(draft).await?;
        Ok(StoryPayload::from(&record))
    }

    /// Draws a portrait from the child's traits and stores it on the child.
    pub async fn illustrate_profile(&self, child_id: &str) -> StoryResult<ImageResult> {
        let profile = self
            .profiles
            .profile_parameters(child_id)
            .await?
            .to_prompt_parameters();
        let prompt = profile_image_prompt(&profile)?;
        let image = bounded(
            GenerationUnit::Profile,
            self.timeout,
            self.generator
                .generate_image(&prompt, GenerationUnit::Profile, &self.image_options),
        )
        .await?;
        self.profiles
            .set_profile_image(child_id, &image.encoded())
            .await?;
        info!("Stored profile image for child {child_id}");
        Ok(image)
    }
}
