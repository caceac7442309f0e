//! Camera enumeration using nokhwa (macOS)
//!
//! Hosts use this to populate a camera picker before wiring their own
//! platform video provider; frame capture and video encoding stay on the
//! host side.

use nokhwa::utils::{ApiBackend, CameraIndex};

use super::DeviceInfo;

/// List available cameras.
pub fn list_cameras() -> Vec<DeviceInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.clone(),
                };
                DeviceInfo {
                    id,
                    name: info.human_name().to_string(),
                    has_video: true,
                    has_audio: false,
                }
            })
            .collect(),
        Err(error) => {
            tracing::warn!(%error, "failed to enumerate cameras");
            Vec::new()
        }
    }
}
