use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{StoryError, StoryResult};
use crate::llm::{spawn_image_generation, GenerationUnit, Generator, ImageOptions, ImageResult};
use crate::prompts::{chapter_image_prompt, PromptParameters};
use crate::story::models::{ExtractedChapter, ImageStyle};

/// Illustrates every chapter concurrently and returns the images in chapter
/// order.
///
/// All prompts are rendered before any request starts, so a template problem
/// never leaves half the requests in flight. Every chapter then runs as its
/// own task. Siblings are not cancelled when one fails: the join waits for
/// all of them and reports the failure of the lowest-numbered chapter.
pub async fn illustrate_chapters(
    generator: Arc<dyn Generator>,
    chapters: &[ExtractedChapter],
    profile: &PromptParameters,
    style: ImageStyle,
    options: &ImageOptions,
    timeout: Duration,
) -> StoryResult<Vec<ImageResult>> {
    let prompts = chapters
        .iter()
        .enumerate()
        .map(|(index, chapter)| chapter_image_prompt(profile, style, &chapter.content, index + 1))
        .collect::<StoryResult<Vec<_>>>()?;

    let handles: Vec<_> = prompts
        .into_iter()
        .enumerate()
        .map(|(index, prompt)| {
            let unit = GenerationUnit::Chapter(index + 1);
            let handle = spawn_image_generation(
                Arc::clone(&generator),
                prompt,
                unit,
                options.clone(),
                timeout,
            );
            (unit, handle)
        })
        .collect();
    info!("Illustrating {} chapters in {} style", handles.len(), style);

    let mut images = Vec::with_capacity(handles.len());
    let mut first_error: Option<StoryError> = None;
    for (unit, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(StoryError::generation(
                unit,
                format!("illustration task did not finish: {join_err}"),
            )),
        };
        match outcome {
            Ok(image) => images.push(image),
            Err(err) => {
                warn!("Illustration for {unit} failed: {err}");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(images),
    }
}
