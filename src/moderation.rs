//! Moderation service consumer contract
//!
//! Finished artifacts go through an external review service before
//! publication: submit the payload, get a task id, poll until the task
//! settles. Only the interface contract lives here; transports are the
//! host's concern.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Artifact;

/// What the review service receives: binary payload plus declared duration.
#[derive(Debug, Clone)]
pub struct ArtifactSubmission {
    pub data: Vec<u8>,
    pub mime: String,
    pub duration_secs: u64,
}

impl From<&Artifact> for ArtifactSubmission {
    fn from(artifact: &Artifact) -> Self {
        Self {
            data: artifact.blob.data.clone(),
            mime: artifact.blob.mime.clone(),
            duration_secs: artifact.duration_secs,
        }
    }
}

/// Opaque review task identifier assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

/// Review task status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Error, Debug, Clone)]
pub enum ModerationError {
    #[error("moderation request failed: {0}")]
    Request(String),

    #[error("review did not settle within {0:?}")]
    Timeout(Duration),
}

/// The external review service boundary.
#[async_trait]
pub trait ModerationClient: Send + Sync {
    async fn submit(&self, submission: &ArtifactSubmission) -> Result<TaskId, ModerationError>;
    async fn status(&self, task: &TaskId) -> Result<ReviewStatus, ModerationError>;
}

/// Poll a task until it leaves `Pending`, once per `poll_interval`, giving
/// up after `timeout`.
pub async fn await_verdict(
    client: &dyn ModerationClient,
    task: &TaskId,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<ReviewStatus, ModerationError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut interval = tokio::time::interval(poll_interval);
    interval.tick().await;

    loop {
        match client.status(task).await? {
            ReviewStatus::Pending => {}
            settled => {
                tracing::debug!(task = %task.0, ?settled, "review settled");
                return Ok(settled);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ModerationError::Timeout(timeout));
        }
        interval.tick().await;
    }
}
