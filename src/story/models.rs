use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::ImageResult;
use crate::prompts::PromptParameters;

pub const UNSPECIFIED: &str = "unspecified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageStyle {
    Cartoon,
    Realistic,
    Fantasy,
    Watercolor,
    Anime,
}

impl ImageStyle {
    pub const ALL: [ImageStyle; 5] = [
        ImageStyle::Cartoon,
        ImageStyle::Realistic,
        ImageStyle::Fantasy,
        ImageStyle::Watercolor,
        ImageStyle::Anime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Cartoon => "Cartoon",
            ImageStyle::Realistic => "Realistic",
            ImageStyle::Fantasy => "Fantasy",
            ImageStyle::Watercolor => "Watercolor",
            ImageStyle::Anime => "Anime",
        }
    }
}

impl fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        ImageStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                format!(
                    "Unknown image style '{trimmed}', expected one of Cartoon, Realistic, Fantasy, Watercolor, Anime"
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoryGenre {
    Fantasy,
    Adventure,
    Educational,
}

impl StoryGenre {
    pub const ALL: [StoryGenre; 3] = [
        StoryGenre::Fantasy,
        StoryGenre::Adventure,
        StoryGenre::Educational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoryGenre::Fantasy => "Fantasy",
            StoryGenre::Adventure => "Adventure",
            StoryGenre::Educational => "Educational",
        }
    }
}

impl fmt::Display for StoryGenre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryGenre {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        StoryGenre::ALL
            .into_iter()
            .find(|genre| genre.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                format!(
                    "Unknown story genre '{trimmed}', expected one of Fantasy, Adventure, Educational"
                )
            })
    }
}

/// Traits describing the story's main character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileParameters {
    pub age_range: String,
    pub sex: String,
    pub eye_color: String,
    pub hair_type: String,
    pub hair_color: String,
    pub ethnicity: String,
    pub fav_animals: Option<String>,
    pub fav_activities: Option<String>,
    pub fav_shows: Option<String>,
}

fn optional_trait(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNSPECIFIED)
        .to_string()
}

impl ProfileParameters {
    /// Absent optional traits become the `unspecified` sentinel so every
    /// template key is always present.
    pub fn to_prompt_parameters(&self) -> PromptParameters {
        let mut parameters = PromptParameters::new();
        parameters.insert("age_range".into(), self.age_range.clone());
        parameters.insert("sex".into(), self.sex.clone());
        parameters.insert("eye_color".into(), self.eye_color.clone());
        parameters.insert("hair_type".into(), self.hair_type.clone());
        parameters.insert("hair_color".into(), self.hair_color.clone());
        parameters.insert("ethnicity".into(), self.ethnicity.clone());
        parameters.insert("fav_animals".into(), optional_trait(&self.fav_animals));
        parameters.insert("fav_activities".into(), optional_trait(&self.fav_activities));
        parameters.insert("fav_shows".into(), optional_trait(&self.fav_shows));
        parameters
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub child_id: String,
    pub topic: String,
    pub image_style: ImageStyle,
    pub story_genre: StoryGenre,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedChapter {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedStory {
    pub title: String,
    pub chapters: Vec<ExtractedChapter>,
}

/// Everything the persistence layer needs to create one story with its
/// chapters. The three lists are index-aligned.
#[derive(Debug, Clone)]
pub struct StoryDraft {
    pub child_id: String,
    pub title: String,
    pub topic: String,
    pub image_style: ImageStyle,
    pub story_genre: StoryGenre,
    pub chapter_titles: Vec<String>,
    pub chapter_contents: Vec<String>,
    pub images: Vec<String>,
}

impl StoryDraft {
    pub fn new(
        request: &StoryRequest,
        story: ExtractedStory,
        images: &[ImageResult],
    ) -> Self {
        let (chapter_titles, chapter_contents) = story
            .chapters
            .into_iter()
            .map(|chapter| (chapter.title, chapter.content))
            .unzip();
        StoryDraft {
            child_id: request.child_id.clone(),
            title: story.title,
            topic: request.topic.clone(),
            image_style: request.image_style,
            story_genre: request.story_genre,
            chapter_titles,
            chapter_contents,
            images: images.iter().map(ImageResult::encoded).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub chapter_id: String,
    pub story_id: String,
    pub title: String,
    pub content: String,
    pub image: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub story_id: String,
    pub child_id: String,
    pub title: String,
    pub topic: String,
    pub image_style: ImageStyle,
    pub story_genre: StoryGenre,
    pub created_at: DateTime<Utc>,
    pub chapters: Vec<ChapterRecord>,
}

/// Story listing entry without chapter bodies or images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySummary {
    pub story_id: String,
    pub title: String,
    pub topic: String,
    pub image_style: ImageStyle,
    pub story_genre: StoryGenre,
    pub created_at: DateTime<Utc>,
    pub chapter_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryPayload {
    pub story_id: String,
    pub title: String,
    pub chapter_titles: Vec<String>,
    pub chapter_contents: Vec<String>,
    pub chapter_images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&StoryRecord> for StoryPayload {
    fn from(record: &StoryRecord) -> Self {
        StoryPayload {
            story_id: record.story_id.clone(),
            title: record.title.clone(),
            chapter_titles: record.chapters.iter().map(|c| c.title.clone()).collect(),
            chapter_contents: record.chapters.iter().map(|c| c.content.clone()).collect(),
            chapter_images: record.chapters.iter().map(|c| c.image.clone()).collect(),
            created_at: record.created_at,
        }
    }
}

pub fn decode_image(encoded: &str) -> Option<Vec<u8>> {
    general_purpose::STANDARD.decode(encoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_and_genres_parse_case_insensitively() {
        assert_eq!("watercolor".parse::<ImageStyle>(), Ok(ImageStyle::Watercolor));
        assert_eq!(" Anime ".parse::<ImageStyle>(), Ok(ImageStyle::Anime));
        assert_eq!("EDUCATIONAL".parse::<StoryGenre>(), Ok(StoryGenre::Educational));
        assert!("Horror".parse::<StoryGenre>().is_err());
        assert!("Pixel".parse::<ImageStyle>().is_err());
    }

    #[test]
    fn absent_and_blank_traits_become_unspecified() {
        let profile = ProfileParameters {
            age_range: "7-9".into(),
            sex: "Female".into(),
            eye_color: "Green".into(),
            hair_type: "Wavy".into(),
            hair_color: "Red".into(),
            ethnicity: "Medium".into(),
            fav_animals: Some("  ".into()),
            fav_activities: None,
            fav_shows: Some("Bluey".into()),
        };
        let parameters = profile.to_prompt_parameters();
        assert_eq!(parameters["fav_animals"], UNSPECIFIED);
        assert_eq!(parameters["fav_activities"], UNSPECIFIED);
        assert_eq!(parameters["fav_shows"], "Bluey");
        assert_eq!(parameters.len(), 9);
    }
}
