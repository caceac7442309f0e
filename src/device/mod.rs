//! Capture device boundary
//!
//! Platform-agnostic traits for the device capability provider. The session
//! owns exactly one live [`DeviceHandle`] at a time and is responsible for
//! releasing it exactly once per acquisition.

#[cfg(feature = "native-devices")]
pub mod microphone;

#[cfg(all(feature = "native-devices", target_os = "macos"))]
pub mod webcam;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::encoder::{EncodingProfile, MediaEncoder};
use crate::error::CaptureResult;
use crate::session::Facing;

/// Audio capture constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
    pub channel_count: u16,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 48000,
            channel_count: 1,
        }
    }
}

/// Video capture constraints (target hints, not hard requirements)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Combined constraint set passed to [`DeviceProvider::request_access`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConstraints {
    pub audio: Option<AudioConstraints>,
    pub video: Option<VideoConstraints>,
    pub facing: Option<Facing>,
}

impl MediaConstraints {
    pub fn wants_video(&self) -> bool {
        self.video.is_some()
    }
}

/// Information about an acquired capture device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Human-readable device name
    pub name: String,

    /// Whether the device delivers video frames
    pub has_video: bool,

    /// Whether the device delivers audio samples
    pub has_audio: bool,
}

/// Capability provider: the platform's media-capture entry point.
///
/// `request_access` may suspend on a permission dialog; failures come back
/// classified (`PermissionDenied` vs `DeviceUnavailable`), never as a panic.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    async fn request_access(
        &self,
        constraints: &MediaConstraints,
    ) -> CaptureResult<Box<dyn DeviceHandle>>;
}

/// An exclusively-owned live capture stream.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    fn describe(&self) -> DeviceInfo;

    /// Encodings this device/platform pair can produce, unordered.
    fn supported_encodings(&self) -> Vec<EncodingProfile>;

    /// Create an encoder consuming this handle's stream.
    async fn open_encoder(&self, profile: &EncodingProfile)
        -> CaptureResult<Box<dyn MediaEncoder>>;

    /// Release the underlying device. Called exactly once by the session.
    fn stop(&mut self);
}

/// A host-supplied monitor view for the live stream (muted; mirrored for the
/// front camera).
pub trait PreviewSurface: Send + Sync {
    fn attach(&self, device: &DeviceInfo, mirrored: bool);
    fn detach(&self);
}
