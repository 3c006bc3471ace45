use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::models::{
    ChapterRow, ChildRecord, JobLease, JobRow, JobStatus, NewChild, StoryRow, StorySummaryRow,
};
use crate::error::{StoryError, StoryResult};
use crate::story::models::{
    ChapterRecord, ProfileParameters, StoryDraft, StoryRecord, StorySummary,
};
use crate::story::store::{ProfileStore, StoryStore};

const JOB_COLUMNS: &str = "job_id, status, request_json, story_id, error_kind, error_message, attempts, lease_expires_at, created_at, updated_at";

pub const ABANDONED_JOB_KIND: &str = "abandoned";

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn init(database_url: &str) -> StoryResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS children (\
                child_id TEXT PRIMARY KEY,\
                name TEXT NOT NULL,\
                age_range TEXT NOT NULL,\
                sex TEXT NOT NULL,\
                eye_color TEXT NOT NULL,\
                hair_type TEXT NOT NULL,\
                hair_color TEXT NOT NULL,\
                ethnicity TEXT NOT NULL,\
                fav_animals TEXT,\
                fav_activities TEXT,\
                fav_shows TEXT,\
                profile_image TEXT,\
                created_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS stories (\
                story_id TEXT PRIMARY KEY,\
                child_id TEXT NOT NULL,\
                title TEXT NOT NULL,\
                topic TEXT NOT NULL,\
                image_style TEXT NOT NULL,\
                story_genre TEXT NOT NULL,\
                created_at TEXT NOT NULL,\
                FOREIGN KEY(child_id) REFERENCES children(child_id) ON DELETE CASCADE\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chapters (\
                chapter_id TEXT PRIMARY KEY,\
                story_id TEXT NOT NULL,\
                title TEXT NOT NULL,\
                content TEXT NOT NULL,\
                image TEXT NOT NULL,\
                chapter_order INTEGER NOT NULL,\
                UNIQUE(story_id, chapter_order),\
                FOREIGN KEY(story_id) REFERENCES stories(story_id) ON DELETE CASCADE\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS story_jobs (\
                job_id TEXT PRIMARY KEY,\
                status TEXT NOT NULL DEFAULT 'queued',\
                request_json TEXT NOT NULL,\
                story_id TEXT,\
                error_kind TEXT,\
                error_message TEXT,\
                attempts INTEGER NOT NULL DEFAULT 0,\
                lease_expires_at INTEGER,\
                created_at TEXT NOT NULL,\
                updated_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_stories_child_id ON stories(child_id);")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chapters_story_id ON chapters(story_id);")
            .execute(&pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_story_jobs_status ON story_jobs(status, created_at);",
        )
        .execute(&pool)
        .await?;

        info!("Database tables created successfully");

        Ok(Database { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> StoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn insert_child(&self, child: &NewChild) -> StoryResult<String> {
        if child.name.trim().is_empty() {
            return Err(StoryError::Validation("child name must not be empty".into()));
        }
        let child_id = new_id();
        sqlx::query(
            "INSERT INTO children (child_id, name, age_range, sex, eye_color, hair_type, hair_color, \
             ethnicity, fav_animals, fav_activities, fav_shows, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&child_id)
        .bind(&child.name)
        .bind(&child.age_range)
        .bind(&child.sex)
        .bind(&child.eye_color)
        .bind(&child.hair_type)
        .bind(&child.hair_color)
        .bind(&child.ethnicity)
        .bind(&child.fav_animals)
        .bind(&child.fav_activities)
        .bind(&child.fav_shows)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        debug!("Inserted child {child_id}");
        Ok(child_id)
    }

    pub async fn get_child(&self, child_id: &str) -> StoryResult<ChildRecord> {
        sqlx::query_as::<_, ChildRecord>(
            "SELECT child_id, name, age_range, sex, eye_color, hair_type, hair_color, ethnicity, \
             fav_animals, fav_activities, fav_shows, profile_image, created_at \
             FROM children WHERE child_id = ?",
        )
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoryError::not_found("child", child_id))
    }

    pub async fn get_story(&self, story_id: &str) -> StoryResult<StoryRecord> {
        let story = sqlx::query_as::<_, StoryRow>(
            "SELECT story_id, child_id, title, topic, image_style, story_genre, created_at \
             FROM stories WHERE story_id = ?",
        )
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoryError::not_found("story", story_id))?;

        let chapters = sqlx::query_as::<_, ChapterRow>(
            "SELECT chapter_id, story_id, title, content, image, chapter_order \
             FROM chapters WHERE story_id = ? ORDER BY chapter_order ASC",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(StoryRecord {
            image_style: story.image_style()?,
            story_genre: story.story_genre()?,
            story_id: story.story_id,
            child_id: story.child_id,
            title: story.title,
            topic: story.topic,
            created_at: story.created_at,
            chapters: chapters.into_iter().map(ChapterRecord::from).collect(),
        })
    }

    /// Newest first. Unknown children are `NotFound` rather than an empty list.
    pub async fn list_child_stories(&self, child_id: &str) -> StoryResult<Vec<StorySummary>> {
        self.get_child(child_id).await?;
        let rows = sqlx::query_as::<_, StorySummaryRow>(
            "SELECT s.story_id, s.title, s.topic, s.image_style, s.story_genre, s.created_at, \
             COUNT(c.chapter_id) AS chapter_count \
             FROM stories s LEFT JOIN chapters c ON c.story_id = s.story_id \
             WHERE s.child_id = ? \
             GROUP BY s.story_id \
             ORDER BY s.created_at DESC, s.rowid DESC",
        )
        .bind(child_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StorySummary::try_from).collect()
    }

    pub async fn enqueue_job(&self, request_json: &str) -> StoryResult<String> {
        let job_id = new_id();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO story_jobs (job_id, status, request_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&job_id)
        .bind(JobStatus::Queued.as_str())
        .bind(request_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(job_id)
    }

    /// Claims the oldest job that is queued or whose lease ran out, moving it
    /// to `running` with a fresh lease. The claim is one `UPDATE ... RETURNING`,
    /// so two workers never hold the same job. Expired jobs that already used
    /// every attempt are failed as `abandoned` instead of being handed out again.
    pub async fn claim_next_job(&self, lease: &JobLease) -> StoryResult<Option<JobRow>> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let lease_ms = i64::try_from(lease.duration.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_ms.saturating_add(lease_ms);

        let mut tx = self.pool.begin().await?;

        let abandoned = sqlx::query(
            "UPDATE story_jobs \
             SET status = 'failed', error_kind = ?, error_message = ?, lease_expires_at = NULL, updated_at = ? \
             WHERE status = 'running' AND lease_expires_at < ? AND attempts >= ?",
        )
        .bind(ABANDONED_JOB_KIND)
        .bind(format!(
            "worker lease expired after {} attempts",
            lease.max_attempts
        ))
        .bind(now)
        .bind(now_ms)
        .bind(lease.max_attempts)
        .execute(&mut *tx)
        .await?;
        if abandoned.rows_affected() > 0 {
            warn!(
                "Marked {} expired story jobs as abandoned",
                abandoned.rows_affected()
            );
        }

        let query = format!(
            "UPDATE story_jobs \
             SET status = 'running', attempts = attempts + 1, lease_expires_at = ?, updated_at = ? \
             WHERE job_id = (SELECT job_id FROM story_jobs \
                             WHERE status = 'queued' \
                                OR (status = 'running' AND lease_expires_at < ? AND attempts < ?) \
                             ORDER BY created_at ASC, rowid ASC LIMIT 1) \
             AND (status = 'queued' OR (status = 'running' AND lease_expires_at < ? AND attempts < ?)) \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(expires_at)
            .bind(now)
            .bind(now_ms)
            .bind(lease.max_attempts)
            .bind(now_ms)
            .bind(lease.max_attempts)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        if let Some(job) = &row {
            if job.attempts > 1 {
                warn!(
                    "Reclaimed story job {} after its lease expired (attempt {})",
                    job.job_id, job.attempts
                );
            }
        }
        Ok(row)
    }

    /// `attempt` is the `attempts` value returned by the claim; a worker whose
    /// lease was taken over can no longer finish the job.
    pub async fn complete_job(&self, job_id: &str, attempt: i64, story_id: &str) -> StoryResult<()> {
        self.finish_job(job_id, attempt, JobStatus::Completed, Some(story_id), None, None)
            .await
    }

    pub async fn fail_job(
        &self,
        job_id: &str,
        attempt: i64,
        kind: &str,
        message: &str,
    ) -> StoryResult<()> {
        self.finish_job(job_id, attempt, JobStatus::Failed, None, Some(kind), Some(message))
            .await
    }

    async fn finish_job(
        &self,
        job_id: &str,
        attempt: i64,
        status: JobStatus,
        story_id: Option<&str>,
        error_kind: Option<&str>,
        error_message: Option<&str>,
    ) -> StoryResult<()> {
        let result = sqlx::query(
            "UPDATE story_jobs \
             SET status = ?, story_id = ?, error_kind = ?, error_message = ?, \
                 lease_expires_at = NULL, updated_at = ? \
             WHERE job_id = ? AND status = 'running' AND attempts = ?",
        )
        .bind(status.as_str())
        .bind(story_id)
        .bind(error_kind)
        .bind(error_message)
        .bind(Utc::now())
        .bind(job_id)
        .bind(attempt)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoryError::Validation(format!(
                "job {job_id} attempt {attempt} no longer holds the lease and cannot be marked {status}"
            )));
        }
        Ok(())
    }

    pub async fn get_job(&self, job_id: &str) -> StoryResult<JobRow> {
        let query = format!("SELECT {JOB_COLUMNS} FROM story_jobs WHERE job_id = ?");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoryError::not_found("job", job_id))
    }
}

fn validate_draft(draft: &StoryDraft) -> StoryResult<()> {
    if draft.title.trim().is_empty() {
        return Err(StoryError::Validation("story title must not be empty".into()));
    }
    if draft.chapter_titles.is_empty() {
        return Err(StoryError::Validation("a story needs at least one chapter".into()));
    }
    let count = draft.chapter_titles.len();
    if draft.chapter_contents.len() != count || draft.images.len() != count {
        return Err(StoryError::Validation(format!(
            "chapter lists differ in length: {} titles, {} contents, {} images",
            count,
            draft.chapter_contents.len(),
            draft.images.len()
        )));
    }
    let blank = draft
        .chapter_titles
        .iter()
        .chain(&draft.chapter_contents)
        .chain(&draft.images)
        .any(|value| value.trim().is_empty());
    if blank {
        return Err(StoryError::Validation(
            "chapter titles, contents and images must not be empty".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl ProfileStore for Database {
    async fn profile_parameters(&self, child_id: &str) -> StoryResult<ProfileParameters> {
        Ok(self.get_child(child_id).await?.profile_parameters())
    }

    async fn set_profile_image(&self, child_id: &str, image: &str) -> StoryResult<()> {
        let result = sqlx::query("UPDATE children SET profile_image = ? WHERE child_id = ?")
            .bind(image)
            .bind(child_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoryError::not_found("child", child_id));
        }
        Ok(())
    }
}

#[async_trait]
impl StoryStore for Database {
    async fn create_story_with_chapters(&self, draft: StoryDraft) -> StoryResult<StoryRecord> {
        validate_draft(&draft)?;

        let mut tx = self.pool.begin().await?;

        let child_exists: Option<(String,)> =
            sqlx::query_as("SELECT child_id FROM children WHERE child_id = ?")
                .bind(&draft.child_id)
                .fetch_optional(&mut *tx)
                .await?;
        if child_exists.is_none() {
            return Err(StoryError::Validation(format!(
                "child '{}' does not exist",
                draft.child_id
            )));
        }

        let story_id = new_id();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO stories (story_id, child_id, title, topic, image_style, story_genre, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&story_id)
        .bind(&draft.child_id)
        .bind(&draft.title)
        .bind(&draft.topic)
        .bind(draft.image_style.as_str())
        .bind(draft.story_genre.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let StoryDraft {
            child_id,
            title,
            topic,
            image_style,
            story_genre,
            chapter_titles,
            chapter_contents,
            images,
        } = draft;

        let mut chapters = Vec::with_capacity(chapter_titles.len());
        let rows = chapter_titles.into_iter().zip(chapter_contents).zip(images);
        for (index, ((chapter_title, content), image)) in rows.enumerate() {
            let chapter = ChapterRecord {
                chapter_id: new_id(),
                story_id: story_id.clone(),
                title: chapter_title,
                content,
                image,
                order: index as i64 + 1,
            };
            sqlx::query(
                "INSERT INTO chapters (chapter_id, story_id, title, content, image, chapter_order) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chapter.chapter_id)
            .bind(&chapter.story_id)
            .bind(&chapter.title)
            .bind(&chapter.content)
            .bind(&chapter.image)
            .bind(chapter.order)
            .execute(&mut *tx)
            .await?;
            chapters.push(chapter);
        }

        tx.commit().await?;
        info!(
            "Persisted story {story_id} with {} chapters for child {child_id}",
            chapters.len()
        );

        Ok(StoryRecord {
            story_id,
            child_id,
            title,
            topic,
            image_style,
            story_genre,
            created_at,
            chapters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::models::{ImageStyle, StoryGenre};

    async fn temp_database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let db = Database::init(&url).await.unwrap();
        (dir, db)
    }

    fn child() -> NewChild {
        NewChild {
            name: "Noor".into(),
            age_range: "4-6".into(),
            sex: "Female".into(),
            eye_color: "Brown".into(),
            hair_type: "Curly".into(),
            hair_color: "Black".into(),
            ethnicity: "Medium".into(),
            fav_animals: Some("cats".into()),
            fav_activities: None,
            fav_shows: None,
        }
    }

    fn draft(child_id: &str, chapters: usize) -> StoryDraft {
        StoryDraft {
            child_id: child_id.to_string(),
            title: "Sea Song".into(),
            topic: "the ocean".into(),
            image_style: ImageStyle::Cartoon,
            story_genre: StoryGenre::Educational,
            chapter_titles: (1..=chapters).map(|n| format!("Wave {n}")).collect(),
            chapter_contents: (1..=chapters).map(|n| format!("Body {n}")).collect(),
            images: (1..=chapters).map(|n| format!("aW1n{n}")).collect(),
        }
    }

    #[tokio::test]
    async fn child_round_trips_through_typed_accessor() {
        let (_dir, db) = temp_database().await;
        let id = db.insert_child(&child()).await.unwrap();
        assert_eq!(id.len(), 32);
        let record = db.get_child(&id).await.unwrap();
        assert_eq!(record.name, "Noor");
        assert_eq!(record.profile_parameters().fav_animals.as_deref(), Some("cats"));
        assert!(record.profile_image.is_none());

        let err = db.get_child("nobody").await.unwrap_err();
        assert!(matches!(err, StoryError::NotFound { entity: "child", .. }));
    }

    #[tokio::test]
    async fn story_and_chapters_are_stored_in_order() {
        let (_dir, db) = temp_database().await;
        let child_id = db.insert_child(&child()).await.unwrap();
        let created = db.create_story_with_chapters(draft(&child_id, 3)).await.unwrap();
        let loaded = db.get_story(&created.story_id).await.unwrap();
        assert_eq!(loaded, created);
        let orders: Vec<i64> = loaded.chapters.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(loaded.chapters[2].title, "Wave 3");

        let summaries = db.list_child_stories(&child_id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].chapter_count, 3);
        assert_eq!(summaries[0].story_genre, StoryGenre::Educational);
    }

    #[tokio::test]
    async fn mismatched_lists_are_rejected_without_writing() {
        let (_dir, db) = temp_database().await;
        let child_id = db.insert_child(&child()).await.unwrap();
        let mut bad = draft(&child_id, 3);
        bad.images.pop();
        let err = db.create_story_with_chapters(bad).await.unwrap_err();
        assert!(matches!(err, StoryError::Validation(_)));

        let err = db
            .create_story_with_chapters(draft(&child_id, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::Validation(_)));
        assert!(db.list_child_stories(&child_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_child_is_rejected_inside_the_transaction() {
        let (_dir, db) = temp_database().await;
        let err = db
            .create_story_with_chapters(draft("ghost", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::Validation(_)));
        let stories: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stories")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(stories.0, 0);
    }

    #[tokio::test]
    async fn failed_chapter_insert_rolls_back_the_story() {
        let (_dir, db) = temp_database().await;
        let child_id = db.insert_child(&child()).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_third_chapter BEFORE INSERT ON chapters \
             WHEN NEW.chapter_order = 3 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let err = db
            .create_story_with_chapters(draft(&child_id, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::Database(_)), "unexpected error: {err}");

        let stories: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stories")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        let chapters: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chapters")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(stories.0, 0);
        assert_eq!(chapters.0, 0);
    }

    fn lease(millis: u64, max_attempts: i64) -> JobLease {
        JobLease {
            duration: std::time::Duration::from_millis(millis),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn jobs_are_claimed_once_in_submission_order() {
        let (_dir, db) = temp_database().await;
        let first = db.enqueue_job("{\"n\":1}").await.unwrap();
        let second = db.enqueue_job("{\"n\":2}").await.unwrap();
        let lease = JobLease::default();

        let claimed = db.claim_next_job(&lease).await.unwrap().unwrap();
        assert_eq!(claimed.job_id, first);
        assert_eq!(claimed.status().unwrap(), JobStatus::Running);
        assert_eq!(claimed.attempts, 1);
        assert!(claimed.lease_expires_at.is_some());

        let claimed_second = db.claim_next_job(&lease).await.unwrap().unwrap();
        assert_eq!(claimed_second.job_id, second);
        assert!(db.claim_next_job(&lease).await.unwrap().is_none());

        db.fail_job(&first, 1, "malformed_story", "no chapters").await.unwrap();
        let failed = db.get_job(&first).await.unwrap();
        assert_eq!(failed.status().unwrap(), JobStatus::Failed);
        assert_eq!(failed.error_kind.as_deref(), Some("malformed_story"));
        assert!(failed.lease_expires_at.is_none());

        assert!(db.complete_job(&first, 1, "story").await.is_err());
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed_and_fences_the_old_worker() {
        let (_dir, db) = temp_database().await;
        let job_id = db.enqueue_job("{}").await.unwrap();

        // the first claimant never reports back
        let stale = db.claim_next_job(&lease(0, 3)).await.unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let reclaimed = db
            .claim_next_job(&lease(60_000, 3))
            .await
            .unwrap()
            .expect("expired job is handed out again");
        assert_eq!(reclaimed.job_id, job_id);
        assert_eq!(reclaimed.attempts, 2);

        assert!(db.claim_next_job(&lease(60_000, 3)).await.unwrap().is_none());
        assert!(db.complete_job(&job_id, stale.attempts, "late").await.is_err());
        db.complete_job(&job_id, reclaimed.attempts, "story").await.unwrap();
        let done = db.get_job(&job_id).await.unwrap();
        assert_eq!(done.status().unwrap(), JobStatus::Completed);
        assert_eq!(done.story_id.as_deref(), Some("story"));
    }

    #[tokio::test]
    async fn job_out_of_attempts_is_failed_as_abandoned() {
        let (_dir, db) = temp_database().await;
        let job_id = db.enqueue_job("{}").await.unwrap();

        db.claim_next_job(&lease(0, 1)).await.unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        assert!(db.claim_next_job(&lease(0, 1)).await.unwrap().is_none());
        let job = db.get_job(&job_id).await.unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Failed);
        assert_eq!(job.error_kind.as_deref(), Some(ABANDONED_JOB_KIND));
        assert_eq!(job.attempts, 1);
    }
}
