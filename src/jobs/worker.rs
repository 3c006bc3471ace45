use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::db::models::{JobLease, JobRow};
use crate::db::Database;
use crate::error::StoryResult;
use crate::story::models::StoryRequest;
use crate::story::StoryPipeline;
use crate::utils::timing::StageTimer;

/// Polls the job table and runs claimed requests through the same pipeline
/// the inline path uses.
pub struct JobWorker {
    db: Arc<Database>,
    pipeline: StoryPipeline,
    poll_interval: Duration,
    lease: JobLease,
}

impl JobWorker {
    pub fn new(db: Arc<Database>, pipeline: StoryPipeline, poll_interval: Duration) -> Self {
        JobWorker {
            db,
            pipeline,
            poll_interval,
            lease: JobLease::default(),
        }
    }

    pub fn with_lease(mut self, lease: JobLease) -> Self {
        self.lease = lease;
        self
    }

    /// Runs at most one job. Returns whether a job was claimed.
    pub async fn run_once(&self) -> StoryResult<bool> {
        let Some(job) = self.db.claim_next_job(&self.lease).await? else {
            return Ok(false);
        };
        self.process(job).await?;
        Ok(true)
    }

    async fn process(&self, job: JobRow) -> StoryResult<()> {
        let timer = StageTimer::start("story_job", job.job_id.as_str());
        let request = match serde_json::from_str::<StoryRequest>(&job.request_json) {
            Ok(request) => request,
            Err(err) => {
                warn!("Job {} has an unreadable request: {err}", job.job_id);
                self.db
                    .fail_job(&job.job_id, job.attempts, "serialization", &err.to_string())
                    .await?;
                timer.finish("serialization");
                return Ok(());
            }
        };

        match self.pipeline.generate_story(&request).await {
            Ok(payload) => {
                self.db
                    .complete_job(&job.job_id, job.attempts, &payload.story_id)
                    .await?;
                info!("Job {} completed with story {}", job.job_id, payload.story_id);
                timer.finish("success");
            }
            Err(err) => {
                self.db
                    .fail_job(&job.job_id, job.attempts, err.kind(), &err.to_string())
                    .await?;
                warn!("Job {} failed: {err}", job.job_id);
                timer.finish(err.kind());
            }
        }
        Ok(())
    }

    /// Drains the queue, then sleeps for the poll interval, until `shutdown`
    /// flips to true or its sender goes away.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> StoryResult<()> {
        info!(
            "Job worker started (poll interval {}ms, lease {}s, {} attempts, {} mode)",
            self.poll_interval.as_millis(),
            self.lease.duration.as_secs(),
            self.lease.max_attempts,
            self.pipeline.mode_label()
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.run_once().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => error!("Job worker iteration failed: {err}"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("Job worker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewChild;
    use crate::jobs::{JobOutcome, StoryJobQueue};
    use crate::llm::FixtureGenerator;
    use crate::story::models::{ImageStyle, ProfileParameters, StoryGenre};

    async fn setup() -> (tempfile::TempDir, Arc<Database>, StoryJobQueue, JobWorker, String) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
        let db = Arc::new(Database::init(&url).await.unwrap());
        let profile = ProfileParameters {
            age_range: "4-6".into(),
            sex: "Male".into(),
            eye_color: "Grey".into(),
            hair_type: "Straight".into(),
            hair_color: "Blonde".into(),
            ethnicity: "Light".into(),
            fav_animals: None,
            fav_activities: None,
            fav_shows: Some("Octonauts".into()),
        };
        let child_id = db
            .insert_child(&NewChild::from_profile("Leo", &profile))
            .await
            .unwrap();
        let pipeline = StoryPipeline::new(Arc::new(FixtureGenerator::new()), db.clone(), db.clone());
        let queue = StoryJobQueue::new(db.clone());
        let worker = JobWorker::new(db.clone(), pipeline, Duration::from_millis(10));
        (dir, db, queue, worker, child_id)
    }

    fn request(child_id: &str) -> StoryRequest {
        StoryRequest {
            child_id: child_id.to_string(),
            topic: "a submarine picnic".into(),
            image_style: ImageStyle::Cartoon,
            story_genre: StoryGenre::Adventure,
        }
    }

    #[tokio::test]
    async fn submitted_job_is_pending_until_the_worker_runs() {
        let (_dir, _db, queue, worker, child_id) = setup().await;
        let handle = queue.submit(&request(&child_id)).await.unwrap();
        assert_eq!(queue.fetch_result(&handle).await.unwrap(), JobOutcome::Pending);

        assert!(worker.run_once().await.unwrap());
        match queue.fetch_result(&handle).await.unwrap() {
            JobOutcome::Completed(payload) => {
                assert_eq!(payload.chapter_titles.len(), 5);
                assert_eq!(payload.chapter_images.len(), 5);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!worker.run_once().await.unwrap());
    }

    #[tokio::test]
    async fn failed_job_keeps_the_error_kind() {
        let (_dir, _db, queue, worker, _child_id) = setup().await;
        let handle = queue.submit(&request("missing-child")).await.unwrap();
        assert!(worker.run_once().await.unwrap());
        match queue.fetch_result(&handle).await.unwrap() {
            JobOutcome::Failed { kind, message } => {
                assert_eq!(kind, "not_found");
                assert!(message.contains("missing-child"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_request_fails_the_job() {
        let (_dir, db, queue, worker, _child_id) = setup().await;
        let job_id = db.enqueue_job("{\"topic\":").await.unwrap();
        assert!(worker.run_once().await.unwrap());
        let handle = crate::jobs::JobHandle { job_id };
        assert!(matches!(
            queue.fetch_result(&handle).await.unwrap(),
            JobOutcome::Failed { ref kind, .. } if kind == "serialization"
        ));
    }

    #[tokio::test]
    async fn job_left_running_by_a_dead_worker_is_finished_after_its_lease() {
        let (_dir, db, queue, worker, child_id) = setup().await;
        let handle = queue.submit(&request(&child_id)).await.unwrap();

        let lost = JobLease {
            duration: Duration::ZERO,
            max_attempts: 3,
        };
        let orphaned = db.claim_next_job(&lost).await.unwrap().unwrap();
        assert_eq!(orphaned.job_id, handle.job_id);
        drop(orphaned);
        assert_eq!(queue.fetch_result(&handle).await.unwrap(), JobOutcome::Pending);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(worker.run_once().await.unwrap());
        assert!(matches!(
            queue.fetch_result(&handle).await.unwrap(),
            JobOutcome::Completed(_)
        ));
        assert_eq!(db.get_job(&handle.job_id).await.unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn job_that_keeps_losing_its_worker_is_reported_abandoned() {
        let (_dir, db, queue, worker, child_id) = setup().await;
        let worker = worker.with_lease(JobLease {
            duration: Duration::from_secs(60),
            max_attempts: 1,
        });
        let handle = queue.submit(&request(&child_id)).await.unwrap();

        let lost = JobLease {
            duration: Duration::ZERO,
            max_attempts: 1,
        };
        db.claim_next_job(&lost).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(!worker.run_once().await.unwrap());
        match queue.fetch_result(&handle).await.unwrap() {
            JobOutcome::Failed { kind, message } => {
                assert_eq!(kind, crate::db::database::ABANDONED_JOB_KIND);
                assert!(message.contains("lease expired"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_loop_processes_jobs_and_stops_on_shutdown() {
        let (_dir, _db, queue, worker, child_id) = setup().await;
        let handle = queue.submit(&request(&child_id)).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker_task = tokio::spawn(async move { worker.run(shutdown_rx).await });

        let outcome = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let outcome = queue.fetch_result(&handle).await.unwrap();
                if outcome != JobOutcome::Pending {
                    return outcome;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(matches!(outcome, JobOutcome::Completed(_)));

        shutdown_tx.send(true).unwrap();
        worker_task.await.unwrap().unwrap();
    }
}
