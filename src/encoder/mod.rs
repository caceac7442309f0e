//! Encoding negotiation and artifact assembly
//!
//! The platform encoder is a collaborator: it consumes a live device stream
//! and emits a finished blob when stopped. This module owns the trait
//! boundary plus the codec preference probing the session performs before
//! recording starts.

pub mod wav;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CaptureResult;

/// A candidate encoding, identified by its MIME/container string
/// (e.g. `video/mp4;codecs=avc1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingProfile(pub String);

impl EncodingProfile {
    pub fn new(mime: impl Into<String>) -> Self {
        Self(mime.into())
    }

    pub fn mime(&self) -> &str {
        &self.0
    }

    /// Default video preference order: newer/more efficient codecs first,
    /// falling back to broadly compatible ones. This is policy, not a
    /// contract; callers override it through `SessionConfig`.
    pub fn default_video_preferences() -> Vec<EncodingProfile> {
        [
            "video/webm;codecs=av1",
            "video/webm;codecs=vp9",
            "video/webm;codecs=vp8",
            "video/mp4;codecs=avc1",
        ]
        .into_iter()
        .map(EncodingProfile::new)
        .collect()
    }

    /// Default audio preference order.
    pub fn default_audio_preferences() -> Vec<EncodingProfile> {
        [
            "audio/webm;codecs=opus",
            "audio/ogg;codecs=opus",
            "audio/mp4;codecs=mp4a",
            "audio/wav",
        ]
        .into_iter()
        .map(EncodingProfile::new)
        .collect()
    }
}

/// Pick the first preferred profile the device supports.
pub fn negotiate<'a>(
    preferences: &'a [EncodingProfile],
    supported: &[EncodingProfile],
) -> Option<&'a EncodingProfile> {
    preferences.iter().find(|p| supported.contains(p))
}

/// A finished, in-memory media payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub data: Vec<u8>,
    pub mime: String,
}

impl MediaBlob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Platform recording API boundary.
///
/// Implementations buffer encoded chunks internally between `start` and
/// `stop`; `stop` is the flush — it resolves once buffered data has been
/// assembled into the final blob. Dropping an encoder without calling `stop`
/// discards buffered data.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Begin buffering encoded chunks, emitting one roughly every
    /// `chunk_interval_ms`.
    async fn start(&mut self, chunk_interval_ms: u64) -> CaptureResult<()>;

    /// Suspend encoding without discarding buffered chunks.
    async fn pause(&mut self) -> CaptureResult<()>;

    /// Resume after a pause.
    async fn resume(&mut self) -> CaptureResult<()>;

    /// Stop and flush: assemble buffered chunks into the final blob.
    async fn stop(&mut self) -> CaptureResult<MediaBlob>;
}
