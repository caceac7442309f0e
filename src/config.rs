//! Session configuration

use serde::{Deserialize, Serialize};

use crate::device::{AudioConstraints, VideoConstraints};
use crate::encoder::EncodingProfile;
use crate::error::{CaptureError, CaptureResult};
use crate::session::Facing;

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Recording ceiling; reaching it stops the recording automatically
    pub max_duration_secs: u64,

    /// Initial camera facing (video sessions)
    pub facing: Facing,

    /// Microphone constraints; `None` for video-only capture
    pub audio: Option<AudioConstraints>,

    /// Camera constraints; `None` for voice-only capture
    pub video: Option<VideoConstraints>,

    /// How often the encoder should emit a buffered chunk
    pub chunk_interval_ms: u64,

    /// Codec preference order, best first. Policy, not contract.
    pub encoding_preferences: Vec<EncodingProfile>,
}

impl SessionConfig {
    /// Video-plus-audio capture with the default codec preferences.
    pub fn video(max_duration_secs: u64) -> Self {
        Self {
            max_duration_secs,
            facing: Facing::Front,
            audio: Some(AudioConstraints::default()),
            video: Some(VideoConstraints::default()),
            chunk_interval_ms: 1000,
            encoding_preferences: EncodingProfile::default_video_preferences(),
        }
    }

    /// Microphone-only capture.
    pub fn voice(max_duration_secs: u64) -> Self {
        Self {
            max_duration_secs,
            facing: Facing::Front,
            audio: Some(AudioConstraints::default()),
            video: None,
            chunk_interval_ms: 1000,
            encoding_preferences: EncodingProfile::default_audio_preferences(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.max_duration_secs == 0 {
            return Err(CaptureError::Other(
                "maxDurationSecs must be at least 1".into(),
            ));
        }
        if self.audio.is_none() && self.video.is_none() {
            return Err(CaptureError::Other(
                "at least one of audio or video constraints is required".into(),
            ));
        }
        Ok(())
    }
}
