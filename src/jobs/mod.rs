pub mod queue;
pub mod worker;

pub use queue::{JobHandle, JobOutcome, StoryJobQueue};
pub use worker::JobWorker;
