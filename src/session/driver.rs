//! Capture session driver
//!
//! Owns the device handle, the recording state machine, the supervising
//! tick timer and artifact assembly. All collaborator failures land in the
//! observable state (`phase == Error` + `last_error`); the `Err` returned by
//! an operation is a convenience for the immediate caller, the snapshot is
//! the source of truth.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::state::{Artifact, ArtifactInfo, Facing, Phase, SessionEvent, SessionSnapshot};
use crate::config::SessionConfig;
use crate::device::{DeviceHandle, DeviceProvider, MediaConstraints, PreviewSurface};
use crate::encoder::{negotiate, MediaEncoder};
use crate::error::{CaptureError, CaptureResult};

/// Mutable session state. Guarded by the session lock; never held across an
/// await point.
struct State {
    phase: Phase,
    facing: Facing,
    elapsed_secs: u64,
    artifact: Option<Artifact>,
    last_error: Option<crate::error::ErrorKind>,
    device: Option<Box<dyn DeviceHandle>>,
    encoder: Option<Box<dyn MediaEncoder>>,
    ticker: Option<JoinHandle<()>>,
}

impl State {
    /// Enter a phase. Every phase-entering transition clears `last_error`
    /// except the transition into `Error` itself.
    fn enter(&mut self, phase: Phase) {
        if phase != Phase::Error {
            self.last_error = None;
        }
        self.phase = phase;
    }

    fn fail(&mut self, error: &CaptureError, events: &broadcast::Sender<SessionEvent>) {
        self.last_error = Some(error.kind());
        self.enter(Phase::Error);
        let _ = events.send(SessionEvent::Errored(error.kind()));
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

struct Inner {
    id: Uuid,
    config: SessionConfig,
    provider: Box<dyn DeviceProvider>,
    preview: Option<Box<dyn PreviewSurface>>,
    /// Bumped by reset and teardown; async continuations capture the value
    /// at their start and abandon their mutation when it has moved on.
    generation: AtomicU64,
    event_tx: broadcast::Sender<SessionEvent>,
    state: RwLock<State>,
}

/// Manages the full recording lifecycle for one media capture attempt.
///
/// One session owns at most one live device handle; the host must not run
/// two sessions against the same physical device.
pub struct CaptureSession {
    inner: Arc<Inner>,
}

impl CaptureSession {
    pub fn new(config: SessionConfig, provider: Box<dyn DeviceProvider>) -> CaptureResult<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(64);
        let facing = config.facing;
        let inner = Arc::new(Inner {
            id: Uuid::new_v4(),
            config,
            provider,
            preview: None,
            generation: AtomicU64::new(0),
            event_tx,
            state: RwLock::new(State {
                phase: Phase::Idle,
                facing,
                elapsed_secs: 0,
                artifact: None,
                last_error: None,
                device: None,
                encoder: None,
                ticker: None,
            }),
        });
        tracing::debug!(session = %inner.id, "capture session created");
        Ok(Self { inner })
    }

    /// Attach a host-supplied preview surface.
    ///
    /// Builder-style: must be called before the first session operation,
    /// while nothing else holds a reference to the session internals.
    ///
    /// # Panics
    ///
    /// Panics if called after an operation has already shared the session
    /// (e.g. once recording has spawned the supervising timer).
    pub fn with_preview(mut self, preview: Box<dyn PreviewSurface>) -> Self {
        let inner = Arc::get_mut(&mut self.inner)
            .expect("with_preview must be called before any session operation");
        inner.preview = Some(preview);
        self
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.read().phase
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.inner.state.read().elapsed_secs
    }

    pub fn facing(&self) -> Facing {
        self.inner.state.read().facing
    }

    /// Clone of the finished artifact, present only once the session has
    /// stopped and the encoder flush has completed.
    pub fn artifact(&self) -> Option<Artifact> {
        self.inner.state.read().artifact.clone()
    }

    /// Subscribe to lifecycle events. Lossy under lag; poll [`snapshot`]
    /// for authoritative state.
    ///
    /// [`snapshot`]: CaptureSession::snapshot
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.read();
        SessionSnapshot {
            session_id: self.inner.id,
            phase: state.phase,
            facing: state.facing,
            elapsed_secs: state.elapsed_secs,
            max_duration_secs: self.inner.config.max_duration_secs,
            artifact: state.artifact.as_ref().map(ArtifactInfo::from),
            last_error: state.last_error,
        }
    }

    /// Snapshot serialized for host frontends polling over IPC.
    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }

    fn constraints(&self, facing: Facing) -> MediaConstraints {
        MediaConstraints {
            audio: self.inner.config.audio.clone(),
            video: self.inner.config.video.clone(),
            facing: self.inner.config.is_video().then_some(facing),
        }
    }

    fn attach_preview(&self, device: &dyn DeviceHandle, facing: Facing) {
        if let Some(preview) = &self.inner.preview {
            let mirrored = self.inner.config.is_video() && facing == Facing::Front;
            preview.attach(&device.describe(), mirrored);
        }
    }

    /// Request device access and move to `Ready`. Valid from `Idle`, `Error`
    /// (retry) and `Ready` (no-op when a handle is already held).
    pub async fn initialize_device(&self, facing: Option<Facing>) -> CaptureResult<()> {
        let target = {
            let mut state = self.inner.state.write();
            match state.phase {
                Phase::Idle | Phase::Error | Phase::Ready => {}
                phase => {
                    return Err(CaptureError::InvalidPhase {
                        operation: "initializeDevice",
                        phase,
                    })
                }
            }
            if state.device.is_some() {
                match facing {
                    // The held handle is still good; recover to Ready
                    // without a second acquisition.
                    None => {
                        state.enter(Phase::Ready);
                        return Ok(());
                    }
                    Some(requested) if requested == state.facing => {
                        state.enter(Phase::Ready);
                        return Ok(());
                    }
                    // A different facing needs a fresh stream.
                    Some(_) => {
                        if let Some(mut device) = state.device.take() {
                            device.stop();
                        }
                    }
                }
            }
            if let Some(facing) = facing {
                state.facing = facing;
            }
            state.enter(Phase::Initializing);
            state.facing
        };

        tracing::info!(session = %self.inner.id, ?target, "requesting device access");
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let acquired = self
            .inner
            .provider
            .request_access(&self.constraints(target))
            .await;

        let mut state = self.inner.state.write();
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            // Torn down or reset while the permission dialog was up; the
            // fresh handle must not outlive that decision.
            if let Ok(mut device) = acquired {
                device.stop();
            }
            return Err(CaptureError::Other("session is no longer live".into()));
        }

        match acquired {
            Ok(device) => {
                self.attach_preview(device.as_ref(), target);
                state.device = Some(device);
                state.enter(Phase::Ready);
                let _ = self.inner.event_tx.send(SessionEvent::DeviceReady);
                tracing::info!(session = %self.inner.id, "device ready");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(session = %self.inner.id, %error, "device access failed");
                state.fail(&error, &self.inner.event_tx);
                Err(error)
            }
        }
    }

    /// Negotiate an encoding, start the encoder and the supervising timer.
    /// Acquires the device first when none is held yet.
    pub async fn start_recording(&self) -> CaptureResult<()> {
        let needs_device = {
            let state = self.inner.state.read();
            match state.phase {
                Phase::Idle | Phase::Error => true,
                Phase::Ready => state.device.is_none(),
                phase => {
                    return Err(CaptureError::InvalidPhase {
                        operation: "startRecording",
                        phase,
                    })
                }
            }
        };
        if needs_device {
            self.initialize_device(None).await?;
        }

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let (mut device, profile) = {
            let mut state = self.inner.state.write();
            if state.phase != Phase::Ready {
                return Err(CaptureError::InvalidPhase {
                    operation: "startRecording",
                    phase: state.phase,
                });
            }
            let device = state.device.take().ok_or(CaptureError::InvalidPhase {
                operation: "startRecording",
                phase: state.phase,
            })?;

            let supported = device.supported_encodings();
            let preferences = &self.inner.config.encoding_preferences;
            match negotiate(preferences, &supported) {
                Some(profile) => (device, profile.clone()),
                None => {
                    state.device = Some(device);
                    let error = CaptureError::EncodingUnsupported {
                        tried: preferences.len(),
                    };
                    state.fail(&error, &self.inner.event_tx);
                    return Err(error);
                }
            }
        };

        tracing::info!(session = %self.inner.id, mime = profile.mime(), "starting recording");
        let opened = device.open_encoder(&profile).await;
        let started = match opened {
            Ok(mut encoder) => encoder
                .start(self.inner.config.chunk_interval_ms)
                .await
                .map(|_| encoder),
            Err(error) => Err(error),
        };

        let mut state = self.inner.state.write();
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            device.stop();
            return Err(CaptureError::Other("session is no longer live".into()));
        }
        state.device = Some(device);

        match started {
            Ok(encoder) => {
                state.encoder = Some(encoder);
                state.artifact = None;
                state.elapsed_secs = 0;
                state.enter(Phase::Recording);
                state.cancel_ticker();
                state.ticker = Some(spawn_ticker(self.inner.clone(), generation));
                let _ = self.inner.event_tx.send(SessionEvent::Started);
                Ok(())
            }
            Err(error) => {
                tracing::error!(session = %self.inner.id, %error, "encoder failed to start");
                state.fail(&error, &self.inner.event_tx);
                Err(error)
            }
        }
    }

    /// Suspend the encoder and freeze the elapsed timer.
    pub async fn pause_recording(&self) -> CaptureResult<()> {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let mut encoder = {
            let mut state = self.inner.state.write();
            if state.phase != Phase::Recording {
                return Err(CaptureError::InvalidPhase {
                    operation: "pauseRecording",
                    phase: state.phase,
                });
            }
            state.encoder.take().ok_or(CaptureError::InvalidPhase {
                operation: "pauseRecording",
                phase: state.phase,
            })?
        };

        let paused = encoder.pause().await;
        let mut state = self.inner.state.write();
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return Err(CaptureError::Other("session is no longer live".into()));
        }

        match paused {
            Ok(()) => {
                state.encoder = Some(encoder);
                state.enter(Phase::Paused);
                let _ = self.inner.event_tx.send(SessionEvent::Paused);
                tracing::info!(session = %self.inner.id, "recording paused");
                Ok(())
            }
            Err(error) => {
                // Encoder fault mid-recording: the attempt is abandoned.
                state.cancel_ticker();
                state.fail(&error, &self.inner.event_tx);
                Err(error)
            }
        }
    }

    /// Resume after a pause without resetting elapsed time.
    pub async fn resume_recording(&self) -> CaptureResult<()> {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let mut encoder = {
            let mut state = self.inner.state.write();
            if state.phase != Phase::Paused {
                return Err(CaptureError::InvalidPhase {
                    operation: "resumeRecording",
                    phase: state.phase,
                });
            }
            state.encoder.take().ok_or(CaptureError::InvalidPhase {
                operation: "resumeRecording",
                phase: state.phase,
            })?
        };

        let resumed = encoder.resume().await;
        let mut state = self.inner.state.write();
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return Err(CaptureError::Other("session is no longer live".into()));
        }

        match resumed {
            Ok(()) => {
                state.encoder = Some(encoder);
                state.enter(Phase::Recording);
                let _ = self.inner.event_tx.send(SessionEvent::Resumed);
                tracing::info!(session = %self.inner.id, "recording resumed");
                Ok(())
            }
            Err(error) => {
                state.cancel_ticker();
                state.fail(&error, &self.inner.event_tx);
                Err(error)
            }
        }
    }

    /// Stop the encoder and flush buffered chunks into the artifact.
    /// Returns the recorded duration in seconds.
    pub async fn stop_recording(&self) -> CaptureResult<u64> {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        finish(&self.inner, generation).await
    }

    /// Discard the artifact and rewind to `Ready` for a retake. The device
    /// handle is kept so no new permission prompt is needed.
    pub fn reset_session(&self) -> CaptureResult<()> {
        let mut state = self.inner.state.write();
        match state.phase {
            Phase::Stopped | Phase::Ready => {}
            phase => {
                return Err(CaptureError::InvalidPhase {
                    operation: "resetSession",
                    phase,
                })
            }
        }
        // Invalidate any in-flight tick or flush before rewinding.
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        state.cancel_ticker();
        state.encoder = None;
        state.artifact = None;
        state.elapsed_secs = 0;
        let next = if state.device.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        };
        state.enter(next);
        let _ = self.inner.event_tx.send(SessionEvent::Reset);
        tracing::info!(session = %self.inner.id, "session reset");
        Ok(())
    }

    /// Swap to the opposite camera. The old handle is released before the
    /// new stream is requested; on failure the session moves to `Error` and
    /// a later `initialize_device` can recover it.
    pub async fn switch_facing(&self) -> CaptureResult<()> {
        if !self.inner.config.is_video() {
            return Err(CaptureError::Other(
                "facing switch requires a video session".into(),
            ));
        }

        let target = {
            let mut state = self.inner.state.write();
            if state.phase != Phase::Ready {
                return Err(CaptureError::InvalidPhase {
                    operation: "switchFacing",
                    phase: state.phase,
                });
            }
            if let Some(mut device) = state.device.take() {
                device.stop();
            }
            if let Some(preview) = &self.inner.preview {
                preview.detach();
            }
            state.facing.opposite()
        };

        tracing::info!(session = %self.inner.id, ?target, "switching camera facing");
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let acquired = self
            .inner
            .provider
            .request_access(&self.constraints(target))
            .await;

        let mut state = self.inner.state.write();
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            if let Ok(mut device) = acquired {
                device.stop();
            }
            return Err(CaptureError::Other("session is no longer live".into()));
        }

        match acquired {
            Ok(device) => {
                self.attach_preview(device.as_ref(), target);
                state.device = Some(device);
                state.facing = target;
                let _ = self.inner.event_tx.send(SessionEvent::FacingSwitched(target));
                Ok(())
            }
            Err(error) => {
                let error = CaptureError::DeviceSwitchFailed(error.to_string());
                tracing::warn!(session = %self.inner.id, %error, "facing switch failed");
                state.fail(&error, &self.inner.event_tx);
                Err(error)
            }
        }
    }

    /// Release everything: device handle, encoder buffers, timer, artifact.
    /// Safe from any phase and idempotent.
    pub fn teardown(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        let mut state = self.inner.state.write();
        state.cancel_ticker();
        state.encoder = None;
        if let Some(mut device) = state.device.take() {
            device.stop();
        }
        if let Some(preview) = &self.inner.preview {
            preview.detach();
        }
        state.artifact = None;
        state.elapsed_secs = 0;

        if state.phase != Phase::Idle {
            state.enter(Phase::Idle);
            let _ = self.inner.event_tx.send(SessionEvent::TornDown);
            tracing::info!(session = %self.inner.id, "capture session torn down");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Supervising timer: one tick per second while the session records,
/// triggering the automatic stop at the configured ceiling. A generation
/// mismatch means reset/teardown won the race and the tick is stale.
fn spawn_ticker(inner: Arc<Inner>, generation: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick of a tokio interval resolves immediately.
        interval.tick().await;
        loop {
            interval.tick().await;

            let at_ceiling = {
                let mut state = inner.state.write();
                if inner.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                if state.phase != Phase::Recording {
                    continue;
                }
                state.elapsed_secs += 1;
                let _ = inner.event_tx.send(SessionEvent::Progress(state.elapsed_secs));
                state.elapsed_secs >= inner.config.max_duration_secs
            };

            if at_ceiling {
                tracing::info!(session = %inner.id, "max duration reached, stopping");
                if let Err(error) = finish(&inner, generation).await {
                    tracing::warn!(session = %inner.id, %error, "auto-stop failed");
                }
                return;
            }
        }
    })
}

/// Shared stop path for manual stop and the auto-stop at the ceiling. The
/// phase stays `Recording`/`Paused` until the flush resolves; callers
/// observe artifact readiness through the snapshot or the `Stopped` event.
async fn finish(inner: &Arc<Inner>, generation: u64) -> CaptureResult<u64> {
    let mut encoder = {
        let mut state = inner.state.write();
        if inner.generation.load(Ordering::SeqCst) != generation {
            return Err(CaptureError::Other("session is no longer live".into()));
        }
        if !matches!(state.phase, Phase::Recording | Phase::Paused) {
            return Err(CaptureError::InvalidPhase {
                operation: "stopRecording",
                phase: state.phase,
            });
        }
        state.encoder.take().ok_or(CaptureError::InvalidPhase {
            operation: "stopRecording",
            phase: state.phase,
        })?
    };

    let flushed = encoder.stop().await;

    let mut state = inner.state.write();
    if inner.generation.load(Ordering::SeqCst) != generation {
        // Teardown or reset raced the flush; the blob belongs to a session
        // that no longer exists.
        return Err(CaptureError::Other("session is no longer live".into()));
    }
    state.cancel_ticker();

    match flushed {
        Ok(blob) => {
            let duration_secs = state.elapsed_secs;
            state.artifact = Some(Artifact {
                blob,
                duration_secs,
                recorded_at: Utc::now(),
            });
            state.enter(Phase::Stopped);
            let _ = inner.event_tx.send(SessionEvent::Stopped { duration_secs });
            tracing::info!(session = %inner.id, duration_secs, "recording stopped");
            Ok(duration_secs)
        }
        Err(error) => {
            tracing::error!(session = %inner.id, %error, "encoder flush failed");
            state.fail(&error, &inner.event_tx);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{wav, EncodingProfile, MediaBlob};
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct MockStats {
        acquired: AtomicUsize,
        released: AtomicUsize,
        preview_attached: AtomicUsize,
        preview_detached: AtomicUsize,
    }

    #[derive(Default)]
    struct MockBehavior {
        /// Outcomes popped per `request_access` call; empty means success.
        access_outcomes: Mutex<VecDeque<CaptureError>>,
        /// Encodings the mock device claims to support.
        supported: Mutex<Option<Vec<EncodingProfile>>>,
        flush_fails: std::sync::atomic::AtomicBool,
        slow_flush_secs: AtomicUsize,
    }

    struct MockProvider {
        stats: Arc<MockStats>,
        behavior: Arc<MockBehavior>,
    }

    struct MockHandle {
        stats: Arc<MockStats>,
        behavior: Arc<MockBehavior>,
    }

    struct MockEncoder {
        behavior: Arc<MockBehavior>,
        mime: String,
    }

    #[async_trait]
    impl DeviceProvider for MockProvider {
        async fn request_access(
            &self,
            _constraints: &MediaConstraints,
        ) -> CaptureResult<Box<dyn DeviceHandle>> {
            if let Some(error) = self.behavior.access_outcomes.lock().pop_front() {
                return Err(error);
            }
            self.stats.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockHandle {
                stats: self.stats.clone(),
                behavior: self.behavior.clone(),
            }))
        }
    }

    #[async_trait]
    impl DeviceHandle for MockHandle {
        fn describe(&self) -> crate::device::DeviceInfo {
            crate::device::DeviceInfo {
                id: "mock-0".into(),
                name: "Mock Device".into(),
                has_video: true,
                has_audio: true,
            }
        }

        fn supported_encodings(&self) -> Vec<EncodingProfile> {
            self.behavior.supported.lock().clone().unwrap_or_else(|| {
                vec![
                    EncodingProfile::new("video/webm;codecs=vp9"),
                    EncodingProfile::new("audio/webm;codecs=opus"),
                ]
            })
        }

        async fn open_encoder(
            &self,
            profile: &EncodingProfile,
        ) -> CaptureResult<Box<dyn MediaEncoder>> {
            Ok(Box::new(MockEncoder {
                behavior: self.behavior.clone(),
                mime: profile.mime().to_string(),
            }))
        }

        fn stop(&mut self) {
            self.stats.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MediaEncoder for MockEncoder {
        async fn start(&mut self, _chunk_interval_ms: u64) -> CaptureResult<()> {
            Ok(())
        }

        async fn pause(&mut self) -> CaptureResult<()> {
            Ok(())
        }

        async fn resume(&mut self) -> CaptureResult<()> {
            Ok(())
        }

        async fn stop(&mut self) -> CaptureResult<MediaBlob> {
            let delay = self.behavior.slow_flush_secs.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_secs(delay as u64)).await;
            }
            if self.behavior.flush_fails.load(Ordering::SeqCst) {
                return Err(CaptureError::RecorderFault("flush failed".into()));
            }
            Ok(MediaBlob {
                data: vec![0u8; 64],
                mime: self.mime.clone(),
            })
        }
    }

    struct MockPreview {
        stats: Arc<MockStats>,
        last_mirrored: Arc<Mutex<Option<bool>>>,
    }

    impl PreviewSurface for MockPreview {
        fn attach(&self, _device: &crate::device::DeviceInfo, mirrored: bool) {
            self.stats.preview_attached.fetch_add(1, Ordering::SeqCst);
            *self.last_mirrored.lock() = Some(mirrored);
        }

        fn detach(&self) {
            self.stats.preview_detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn harness(config: SessionConfig) -> (CaptureSession, Arc<MockStats>, Arc<MockBehavior>) {
        let stats = Arc::new(MockStats::default());
        let behavior = Arc::new(MockBehavior::default());
        let session = CaptureSession::new(
            config,
            Box::new(MockProvider {
                stats: stats.clone(),
                behavior: behavior.clone(),
            }),
        )
        .unwrap();
        (session, stats, behavior)
    }

    /// Advance the paused clock one second at a time, letting the ticker
    /// task run before and after each step so a freshly spawned ticker
    /// anchors its interval before time moves.
    async fn ticks(n: u64) {
        for _ in 0..n {
            tokio::task::yield_now().await;
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_after_45_seconds() {
        let (session, _, _) = harness(SessionConfig::video(90));

        session.initialize_device(None).await.unwrap();
        assert_eq!(session.phase(), Phase::Ready);

        session.start_recording().await.unwrap();
        assert_eq!(session.phase(), Phase::Recording);

        ticks(45).await;
        let duration = session.stop_recording().await.unwrap();

        assert_eq!(duration, 45);
        assert_eq!(session.phase(), Phase::Stopped);
        let artifact = session.artifact().unwrap();
        assert_eq!(artifact.duration_secs, 45);
        assert_eq!(artifact.blob.mime, "video/webm;codecs=vp9");
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_surfaces_as_state() {
        let (session, stats, behavior) = harness(SessionConfig::video(90));
        behavior
            .access_outcomes
            .lock()
            .push_back(CaptureError::PermissionDenied("camera".into()));

        let err = session.initialize_device(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::Error);
        assert_eq!(snapshot.last_error, Some(ErrorKind::PermissionDenied));
        assert!(snapshot.artifact.is_none());
        assert_eq!(stats.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_ceiling_and_stops_on_its_own() {
        let (session, _, _) = harness(SessionConfig::video(90));

        session.start_recording().await.unwrap();
        ticks(90).await;

        assert_eq!(session.phase(), Phase::Stopped);
        let artifact = session.artifact().unwrap();
        assert_eq!(artifact.duration_secs, 90);

        // The ticker is done; more wall-clock time changes nothing.
        ticks(5).await;
        assert_eq!(session.elapsed_secs(), 90);
        assert_eq!(session.phase(), Phase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_timer_and_releases_device() {
        let (session, stats, _) = harness(SessionConfig::video(90));

        session.start_recording().await.unwrap();
        ticks(3).await;
        session.pause_recording().await.unwrap();
        assert_eq!(session.phase(), Phase::Paused);

        session.teardown();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(stats.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(stats.released.load(Ordering::SeqCst), 1);

        // A stale tick firing after teardown must not mutate anything.
        ticks(5).await;
        assert_eq!(session.elapsed_secs(), 0);
        assert_eq!(session.phase(), Phase::Idle);

        // Idempotent: no double release.
        session.teardown();
        assert_eq!(stats.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_facing_switch_is_recoverable() {
        let (session, stats, behavior) = harness(SessionConfig::video(90));

        session.initialize_device(None).await.unwrap();
        behavior
            .access_outcomes
            .lock()
            .push_back(CaptureError::DeviceUnavailable("back camera".into()));

        let err = session.switch_facing().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceSwitchFailed);
        assert_eq!(session.phase(), Phase::Error);
        assert_eq!(
            session.snapshot().last_error,
            Some(ErrorKind::DeviceSwitchFailed)
        );
        // The old handle was released before the failed re-acquire.
        assert_eq!(stats.released.load(Ordering::SeqCst), 1);

        // Same object recovers through a plain re-initialize.
        session.initialize_device(None).await.unwrap();
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(stats.acquired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_facing_switch_swaps_handles() {
        let (session, stats, _) = harness(SessionConfig::video(90));

        session.initialize_device(None).await.unwrap();
        assert_eq!(session.facing(), Facing::Front);

        session.switch_facing().await.unwrap();
        assert_eq!(session.facing(), Facing::Back);
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(stats.acquired.load(Ordering::SeqCst), 2);
        assert_eq!(stats.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_time_is_never_counted() {
        let (session, _, _) = harness(SessionConfig::video(90));

        session.start_recording().await.unwrap();
        ticks(3).await;
        session.pause_recording().await.unwrap();
        ticks(5).await;
        assert_eq!(session.elapsed_secs(), 3);

        session.resume_recording().await.unwrap();
        ticks(2).await;
        assert_eq!(session.elapsed_secs(), 5);

        let duration = session.stop_recording().await.unwrap();
        assert_eq!(duration, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_artifact_and_keeps_device() {
        let (session, stats, _) = harness(SessionConfig::video(90));

        session.start_recording().await.unwrap();
        ticks(2).await;
        session.stop_recording().await.unwrap();
        assert!(session.artifact().is_some());

        session.reset_session().unwrap();
        assert_eq!(session.phase(), Phase::Ready);
        assert!(session.artifact().is_none());
        assert_eq!(session.elapsed_secs(), 0);

        // Retake without a second permission prompt.
        session.start_recording().await.unwrap();
        assert_eq!(stats.acquired.load(Ordering::SeqCst), 1);
        ticks(1).await;
        session.stop_recording().await.unwrap();
        assert_eq!(session.artifact().unwrap().duration_secs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn phase_preconditions_leave_state_untouched() {
        let (session, _, _) = harness(SessionConfig::video(90));
        session.initialize_device(None).await.unwrap();

        let err = session.pause_recording().await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidPhase { .. }));
        assert_eq!(session.phase(), Phase::Ready);
        assert!(session.snapshot().last_error.is_none());

        let err = session.resume_recording().await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidPhase { .. }));
        let err = session.stop_recording().await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidPhase { .. }));
        assert_eq!(session.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn start_acquires_device_when_none_is_held() {
        let (session, stats, _) = harness(SessionConfig::voice(120));

        session.start_recording().await.unwrap();
        assert_eq!(session.phase(), Phase::Recording);
        assert_eq!(stats.acquired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_encodings_fail_cleanly() {
        let (session, _, behavior) = harness(SessionConfig::video(90));
        *behavior.supported.lock() = Some(vec![EncodingProfile::new("video/x-prores")]);

        let err = session.start_recording().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingUnsupported);
        assert_eq!(session.phase(), Phase::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_failure_abandons_the_recording() {
        let (session, _, behavior) = harness(SessionConfig::video(90));

        session.start_recording().await.unwrap();
        ticks(4).await;
        behavior.flush_fails.store(true, Ordering::SeqCst);

        let err = session.stop_recording().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecorderFault);
        assert_eq!(session.phase(), Phase::Error);
        assert!(session.artifact().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn late_flush_after_teardown_is_abandoned() {
        let (session, stats, behavior) = harness(SessionConfig::video(90));
        behavior.slow_flush_secs.store(5, Ordering::SeqCst);

        session.start_recording().await.unwrap();
        ticks(2).await;

        let inner = session.inner.clone();
        let generation = inner.generation.load(Ordering::SeqCst);
        let flush = tokio::spawn(async move { finish(&inner, generation).await });
        tokio::task::yield_now().await;

        // Teardown wins the race while the encoder is still flushing.
        session.teardown();
        ticks(6).await;

        let err = flush.await.unwrap().unwrap_err();
        assert!(matches!(err, CaptureError::Other(_)));
        assert!(session.artifact().is_none());
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(stats.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn events_trace_the_lifecycle() {
        let (session, _, _) = harness(SessionConfig::video(10));
        let mut events = session.subscribe();

        session.start_recording().await.unwrap();
        ticks(10).await;

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::DeviceReady));
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::Started));
        let mut saw_stop = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Stopped { duration_secs } = event {
                assert_eq!(duration_secs, 10);
                saw_stop = true;
            }
        }
        assert!(saw_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_is_mirrored_for_the_front_camera() {
        let stats = Arc::new(MockStats::default());
        let behavior = Arc::new(MockBehavior::default());
        let mirrored = Arc::new(Mutex::new(None));
        let session = CaptureSession::new(
            SessionConfig::video(30),
            Box::new(MockProvider {
                stats: stats.clone(),
                behavior: behavior.clone(),
            }),
        )
        .unwrap()
        .with_preview(Box::new(MockPreview {
            stats: stats.clone(),
            last_mirrored: mirrored.clone(),
        }));

        session.initialize_device(Some(Facing::Front)).await.unwrap();
        assert_eq!(*mirrored.lock(), Some(true));

        session.switch_facing().await.unwrap();
        assert_eq!(*mirrored.lock(), Some(false));
        assert_eq!(stats.preview_detached.load(Ordering::SeqCst), 1);

        session.teardown();
        assert_eq!(stats.preview_detached.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "with_preview must be called before")]
    async fn preview_attachment_after_start_is_refused() {
        let (session, stats, _) = harness(SessionConfig::video(30));
        session.start_recording().await.unwrap();

        // The supervising timer already shares the session internals.
        let _ = session.with_preview(Box::new(MockPreview {
            stats: stats.clone(),
            last_mirrored: Arc::new(Mutex::new(None)),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_serializes_for_the_frontend() {
        let (session, _, _) = harness(SessionConfig::voice(60));
        session.initialize_device(None).await.unwrap();

        let json = session.snapshot_json();
        assert_eq!(json["phase"], "ready");
        assert_eq!(json["maxDurationSecs"], 60);
        assert!(json["artifact"].is_null());
    }

    #[test]
    fn wav_blob_satisfies_the_artifact_contract() {
        let blob = wav::assemble(&[0.1, -0.1, 0.2], 48000, 1);
        let artifact = Artifact {
            blob,
            duration_secs: 1,
            recorded_at: Utc::now(),
        };
        let info = ArtifactInfo::from(&artifact);
        assert_eq!(info.mime, "audio/wav");
        assert!(info.size_bytes > 44);
    }
}
