pub mod illustrate;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod store;

pub use models::{
    ImageStyle, ProfileParameters, StoryDraft, StoryGenre, StoryPayload, StoryRecord,
    StoryRequest, StorySummary,
};
pub use pipeline::StoryPipeline;
pub use store::{ProfileStore, StoryStore};
