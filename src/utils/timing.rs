use std::time::Instant;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::error::StoryResult;
use crate::utils::logging::TIMING_TARGET;

/// Wraps one generation request with request/response events on the timing
/// target.
pub async fn log_generation_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> StoryResult<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = StoryResult<T>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=generation_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = match &result {
        Ok(_) => "success",
        Err(err) => err.kind(),
    };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=generation_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

/// Times one pipeline stage (a whole story run, a job) on the timing target.
pub struct StageTimer {
    stage: &'static str,
    subject: String,
    started_perf: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        info!(
            target: TIMING_TARGET,
            "event=stage_started stage={} subject={} started_at={}",
            stage,
            subject,
            Utc::now().to_rfc3339()
        );
        StageTimer {
            stage,
            subject,
            started_perf: Instant::now(),
        }
    }

    pub fn finish(self, status: &str) {
        info!(
            target: TIMING_TARGET,
            "event=stage_completed stage={} subject={} duration_s={:.3} status={}",
            self.stage,
            self.subject,
            self.started_perf.elapsed().as_secs_f64(),
            status
        );
    }
}
