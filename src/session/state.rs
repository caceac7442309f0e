//! Session state types
//!
//! Defines the capture lifecycle phases and the serializable snapshot
//! exposed to host UIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encoder::MediaBlob;
use crate::error::ErrorKind;

/// Lifecycle phase of a capture session. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No device acquired yet
    #[default]
    Idle,
    /// Waiting on device access (permission dialog, stream negotiation)
    Initializing,
    /// Device acquired, preview live, not recording
    Ready,
    /// Encoder running, elapsed time advancing
    Recording,
    /// Encoder suspended, elapsed time frozen
    Paused,
    /// Recording finished, artifact available once flushed
    Stopped,
    /// A collaborator failed; see `last_error`
    Error,
}

/// Which camera sensor a video session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    Front,
    Back,
}

impl Facing {
    pub fn opposite(self) -> Facing {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }
}

/// The finished recording: binary payload plus declared duration.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub blob: MediaBlob,
    pub duration_secs: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Artifact metadata for snapshots (payload bytes stay out of serialized
/// state).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub mime: String,
    pub size_bytes: usize,
    pub duration_secs: u64,
    pub recorded_at: DateTime<Utc>,
}

impl From<&Artifact> for ArtifactInfo {
    fn from(artifact: &Artifact) -> Self {
        Self {
            mime: artifact.blob.mime.clone(),
            size_bytes: artifact.blob.len(),
            duration_secs: artifact.duration_secs,
            recorded_at: artifact.recorded_at,
        }
    }
}

/// A consistent point-in-time view of the session for the host UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: uuid::Uuid,
    pub phase: Phase,
    pub facing: Facing,
    pub elapsed_secs: u64,
    pub max_duration_secs: u64,
    pub artifact: Option<ArtifactInfo>,
    pub last_error: Option<ErrorKind>,
}

/// Events broadcast as the session moves through its lifecycle.
///
/// The stream is lossy under lag; the snapshot is the source of truth.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Device acquired, session is previewable
    DeviceReady,
    /// Recording started
    Started,
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// One second of recording elapsed
    Progress(u64),
    /// Recording stopped and flushed
    Stopped { duration_secs: u64 },
    /// Camera facing switched
    FacingSwitched(Facing),
    /// Session reset for a retake
    Reset,
    /// A collaborator failed
    Errored(ErrorKind),
    /// Session torn down, device released
    TornDown,
}
