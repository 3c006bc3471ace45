use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::JobStatus;
use crate::db::Database;
use crate::error::{StoryError, StoryResult};
use crate::story::models::{StoryPayload, StoryRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Pending,
    Completed(StoryPayload),
    Failed { kind: String, message: String },
}

/// Deferred story generation backed by the `story_jobs` table. Submitting
/// returns at once; a `JobWorker` picks the request up later.
#[derive(Clone)]
pub struct StoryJobQueue {
    db: Arc<Database>,
}

impl StoryJobQueue {
    pub fn new(db: Arc<Database>) -> Self {
        StoryJobQueue { db }
    }

    pub async fn submit(&self, request: &StoryRequest) -> StoryResult<JobHandle> {
        let request_json = serde_json::to_string(request)?;
        let job_id = self.db.enqueue_job(&request_json).await?;
        info!("Queued story job {job_id} for child {}", request.child_id);
        Ok(JobHandle { job_id })
    }

    pub async fn fetch_result(&self, handle: &JobHandle) -> StoryResult<JobOutcome> {
        let job = self.db.get_job(&handle.job_id).await?;
        match job.status()? {
            JobStatus::Queued | JobStatus::Running => Ok(JobOutcome::Pending),
            JobStatus::Failed => Ok(JobOutcome::Failed {
                kind: job.error_kind.unwrap_or_else(|| "unknown".to_string()),
                message: job.error_message.unwrap_or_default(),
            }),
            JobStatus::Completed => {
                let story_id = job.story_id.ok_or_else(|| {
                    StoryError::Validation(format!(
                        "job {} is completed but has no story",
                        job.job_id
                    ))
                })?;
                let story = self.db.get_story(&story_id).await?;
                Ok(JobOutcome::Completed(StoryPayload::from(&story)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_job_without_a_story_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("queue.db").display());
        let db = Arc::new(Database::init(&url).await.unwrap());
        let job_id = db.enqueue_job("{}").await.unwrap();
        sqlx::query("UPDATE story_jobs SET status = 'completed', story_id = NULL WHERE job_id = ?")
            .bind(&job_id)
            .execute(db.pool())
            .await
            .unwrap();

        let queue = StoryJobQueue::new(db);
        let err = queue
            .fetch_result(&JobHandle {
                job_id: job_id.clone(),
            })
            .await
            .unwrap_err();
        match err {
            StoryError::Validation(message) => assert!(message.contains(&job_id)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
