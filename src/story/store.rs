use async_trait::async_trait;

use crate::error::StoryResult;
use crate::story::models::{ProfileParameters, StoryDraft, StoryRecord};

/// Read access to child profiles plus the one write the pipeline performs on
/// them.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `NotFound` when the child does not exist.
    async fn profile_parameters(&self, child_id: &str) -> StoryResult<ProfileParameters>;

    async fn set_profile_image(&self, child_id: &str, image: &str) -> StoryResult<()>;
}

#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Creates the story row and every chapter row atomically. Chapter
    /// `order` is the 1-based position in the draft.
    async fn create_story_with_chapters(&self, draft: StoryDraft) -> StoryResult<StoryRecord>;
}
