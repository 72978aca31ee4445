/// Image-to-3D job tracking
///
/// At most one job is followed at a time. Poll answers carry their task id,
/// and answers for any other task are dropped.

use crate::api::{GenerationStatus, ModelStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    pub task_id: String,
    pub product_name: String,
    pub status: ModelStatus,
    pub progress: u8,
    pub model_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl GenerationJob {
    pub fn new(task_id: String, product_name: String) -> Self {
        Self {
            task_id,
            product_name,
            status: ModelStatus::Pending,
            progress: 0,
            model_url: None,
            thumbnail_url: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_ready(&self) -> bool {
        self.status == ModelStatus::Succeeded
    }
}

/// What a poll answer did to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not the tracked task, or nothing tracked
    Ignored,
    Progress,
    /// Status just became terminal
    Finished(ModelStatus),
}

#[derive(Debug, Default)]
pub struct GenerationTracker {
    job: Option<GenerationJob>,
}

impl GenerationTracker {
    pub fn job(&self) -> Option<&GenerationJob> {
        self.job.as_ref()
    }

    /// Replace whatever was tracked with a fresh job
    pub fn start(&mut self, task_id: String, product_name: String) {
        self.job = Some(GenerationJob::new(task_id, product_name));
    }

    /// Task id to poll next, if a job is still running
    pub fn pending_task(&self) -> Option<&str> {
        self.job
            .as_ref()
            .filter(|job| !job.is_finished())
            .map(|job| job.task_id.as_str())
    }

    pub fn apply(&mut self, task_id: &str, update: GenerationStatus) -> PollOutcome {
        let Some(job) = self.job.as_mut().filter(|job| job.task_id == task_id) else {
            return PollOutcome::Ignored;
        };
        if job.is_finished() {
            return PollOutcome::Ignored;
        }

        job.status = update.status;
        job.progress = update.progress.min(100);
        if update.model_url.is_some() {
            job.model_url = update.model_url;
        }
        if update.thumbnail_url.is_some() {
            job.thumbnail_url = update.thumbnail_url;
        }

        if job.is_finished() {
            PollOutcome::Finished(job.status)
        } else {
            PollOutcome::Progress
        }
    }
}
