//! Media capture session management.
//!
//! Drives a camera/microphone capture device through a recording lifecycle
//! (idle, previewing, recording, paused, stopped) and produces a
//! finite-duration media blob plus enough observable state for a host UI to
//! render progress, controls and error feedback.
//!
//! The platform pieces are collaborators behind traits: a
//! [`device::DeviceProvider`] hands out exclusively-owned stream handles, a
//! [`encoder::MediaEncoder`] turns a stream into an in-memory blob, and an
//! optional [`device::PreviewSurface`] mirrors the live stream back to the
//! user. The [`session::CaptureSession`] owns the state machine, the
//! one-second supervising timer and the artifact.
//!
//! ```no_run
//! use capture_session::{CaptureSession, SessionConfig};
//! # async fn demo(provider: Box<dyn capture_session::device::DeviceProvider>) -> Result<(), capture_session::CaptureError> {
//! let session = CaptureSession::new(SessionConfig::video(90), provider)?;
//! session.start_recording().await?;
//! // ... user records ...
//! let duration = session.stop_recording().await?;
//! let artifact = session.artifact().expect("flushed after stop");
//! assert_eq!(artifact.duration_secs, duration);
//! # Ok(()) }
//! ```

pub mod config;
pub mod device;
pub mod encoder;
pub mod error;
pub mod moderation;
pub mod session;

pub use config::SessionConfig;
pub use device::{AudioConstraints, MediaConstraints, VideoConstraints};
pub use encoder::{EncodingProfile, MediaBlob};
pub use error::{CaptureError, CaptureResult, ErrorKind};
pub use session::{Artifact, CaptureSession, Facing, Phase, SessionEvent, SessionSnapshot};
