pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod prompts;
pub mod story;
pub mod utils;

pub use error::{StoryError, StoryResult};
