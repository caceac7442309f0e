//! Capture session module
//!
//! This module implements the recording lifecycle:
//! - Phase state machine and serializable snapshots
//! - CaptureSession driver with the supervising duration timer

pub mod driver;
pub mod state;

pub use driver::CaptureSession;
pub use state::{Artifact, ArtifactInfo, Facing, Phase, SessionEvent, SessionSnapshot};
