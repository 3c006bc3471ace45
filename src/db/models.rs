use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{StoryError, StoryResult};
use crate::story::models::{
    ChapterRecord, ImageStyle, ProfileParameters, StoryGenre, StorySummary,
};

#[derive(Debug, Clone)]
pub struct NewChild {
    pub name: String,
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

impl NewChild {
    pub fn from_profile(name: &str, profile: &ProfileParameters) -> Self {
        NewChild {
            name: name.to_string(),
            age_range: profile.age_range.clone(),
            sex: profile.sex.clone(),
            eye_color: profile.eye_color.clone(),
            hair_type: profile.hair_type.clone(),
            hair_color: profile.hair_color.clone(),
            ethnicity: profile.ethnicity.clone(),
            fav_animals: profile.fav_animals.clone(),
            fav_activities: profile.fav_activities.clone(),
            fav_shows: profile.fav_shows.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChildRecord {
    pub child_id: String,
    pub name: String,
    pub age_range: String,
    pub sex: String,
    pub eye_color: String,
    pub hair_type: String,
    pub hair_color: String,
    pub ethnicity: String,
    pub fav_animals: Option<String>,
    pub fav_activities: Option<String>,
    pub fav_shows: Option<String>,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChildRecord {
    /// The traits used for prompts. The name stays out on purpose.
    pub fn profile_parameters(&self) -> ProfileParameters {
        ProfileParameters {
            age_range: self.age_range.clone(),
            sex: self.sex.clone(),
            eye_color: self.eye_color.clone(),
            hair_type: self.hair_type.clone(),
            hair_color: self.hair_color.clone(),
            ethnicity: self.ethnicity.clone(),
            fav_animals: self.fav_animals.clone(),
            fav_activities: self.fav_activities.clone(),
            fav_shows: self.fav_shows.clone(),
        }
    }
}

fn parse_style(value: &str) -> StoryResult<ImageStyle> {
    value
        .parse::<ImageStyle>()
        .map_err(|err| StoryError::Validation(format!("stored row is invalid: {err}")))
}

fn parse_genre(value: &str) -> StoryResult<StoryGenre> {
    value
        .parse::<StoryGenre>()
        .map_err(|err| StoryError::Validation(format!("stored row is invalid: {err}")))
}

#[derive(Debug, Clone, FromRow)]
pub struct StoryRow {
    pub story_id: String,
    pub child_id: String,
    pub title: String,
    pub topic: String,
    pub image_style: String,
    pub story_genre: String,
    pub created_at: DateTime<Utc>,
}

impl StoryRow {
    pub fn image_style(&self) -> StoryResult<ImageStyle> {
        parse_style(&self.image_style)
    }

    pub fn story_genre(&self) -> StoryResult<StoryGenre> {
        parse_genre(&self.story_genre)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChapterRow {
    pub chapter_id: String,
    pub story_id: String,
    pub title: String,
    pub content: String,
    pub image: String,
    pub chapter_order: i64,
}

impl From<ChapterRow> for ChapterRecord {
    fn from(row: ChapterRow) -> Self {
        ChapterRecord {
            chapter_id: row.chapter_id,
            story_id: row.story_id,
            title: row.title,
            content: row.content,
            image: row.image,
            order: row.chapter_order,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StorySummaryRow {
    pub story_id: String,
    pub title: String,
    pub topic: String,
    pub image_style: String,
    pub story_genre: String,
    pub created_at: DateTime<Utc>,
    pub chapter_count: i64,
}

impl TryFrom<StorySummaryRow> for StorySummary {
    type Error = StoryError;

    fn try_from(row: StorySummaryRow) -> StoryResult<Self> {
        Ok(StorySummary {
            image_style: parse_style(&row.image_style)?,
            story_genre: parse_genre(&row.story_genre)?,
            story_id: row.story_id,
            title: row.title,
            topic: row.topic,
            created_at: row.created_at,
            chapter_count: row.chapter_count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("Unknown job status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub job_id: String,
    pub status: String,
    pub request_json: String,
    pub story_id: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub attempts: i64,
    /// Unix milliseconds; set only while `running`.
    pub lease_expires_at: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    pub fn status(&self) -> StoryResult<JobStatus> {
        self.status
            .parse::<JobStatus>()
            .map_err(|err| StoryError::Validation(format!("stored job is invalid: {err}")))
    }
}

/// How long a claimed job stays with one worker, and how many claims a job
/// gets before an expired lease fails it for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobLease {
    pub duration: Duration,
    pub max_attempts: i64,
}

impl Default for JobLease {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(600),
            max_attempts: 3,
        }
    }
}
