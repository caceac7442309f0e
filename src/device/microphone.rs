//! Native microphone capture using cpal
//!
//! The cpal stream is not `Send`, so it lives on a dedicated thread that
//! stays alive for the lifetime of the handle; the capture callback feeds a
//! shared sample buffer that the WAV encoder drains on flush.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;

use super::{DeviceHandle, DeviceInfo, DeviceProvider, MediaConstraints};
use crate::encoder::{wav, EncodingProfile, MediaEncoder};
use crate::error::{CaptureError, CaptureResult};

/// List available microphone devices.
pub fn list_input_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices
            .enumerate()
            .map(|(index, device)| DeviceInfo {
                id: index.to_string(),
                name: device.name().unwrap_or_else(|_| "Unknown".to_string()),
                has_video: false,
                has_audio: true,
            })
            .collect(),
        Err(error) => {
            tracing::warn!(%error, "failed to enumerate input devices");
            Vec::new()
        }
    }
}

/// Microphone-only device provider backed by the platform's default input
/// device.
#[derive(Default)]
pub struct MicrophoneProvider;

struct StreamMeta {
    name: String,
    sample_rate: u32,
    channels: u16,
}

#[async_trait]
impl DeviceProvider for MicrophoneProvider {
    async fn request_access(
        &self,
        constraints: &MediaConstraints,
    ) -> CaptureResult<Box<dyn DeviceHandle>> {
        if constraints.audio.is_none() {
            return Err(CaptureError::Other(
                "microphone provider requires audio constraints".into(),
            ));
        }
        if constraints.wants_video() {
            return Err(CaptureError::DeviceUnavailable(
                "microphone provider cannot satisfy video constraints".into(),
            ));
        }

        let capturing = Arc::new(AtomicBool::new(false));
        let live = Arc::new(AtomicBool::new(true));
        let samples = Arc::new(Mutex::new(Vec::new()));

        let (ready_tx, ready_rx) = mpsc::channel();
        let thread = {
            let capturing = capturing.clone();
            let live = live.clone();
            let samples = samples.clone();
            std::thread::spawn(move || run_capture(ready_tx, capturing, live, samples))
        };

        // Stream setup is quick; the channel resolves as soon as the stream
        // is playing or has failed to build.
        let meta = match ready_rx.recv() {
            Ok(Ok(meta)) => meta,
            Ok(Err(error)) => {
                let _ = thread.join();
                return Err(error);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(CaptureError::Other("capture thread exited".into()));
            }
        };

        tracing::info!(
            device = %meta.name,
            sample_rate = meta.sample_rate,
            channels = meta.channels,
            "microphone stream started"
        );

        Ok(Box::new(MicrophoneHandle {
            meta,
            capturing,
            live,
            samples,
            thread: Some(thread),
        }))
    }
}

fn run_capture(
    ready: mpsc::Sender<CaptureResult<StreamMeta>>,
    capturing: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready.send(Err(CaptureError::DeviceUnavailable(
                "no default input device".into(),
            )));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(error) => {
            let _ = ready.send(Err(CaptureError::DeviceUnavailable(format!(
                "no input config: {error}"
            ))));
            return;
        }
    };

    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let config = supported.config();
    let err_fn = |error| tracing::error!(%error, "microphone stream error");

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let capturing = capturing.clone();
            let samples = samples.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if capturing.load(Ordering::Relaxed) {
                        samples.lock().extend_from_slice(data);
                    }
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let capturing = capturing.clone();
            let samples = samples.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if capturing.load(Ordering::Relaxed) {
                        samples
                            .lock()
                            .extend(data.iter().map(|&s| s as f32 / i16::MAX as f32));
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            let _ = ready.send(Err(CaptureError::Other(format!(
                "unsupported sample format {other:?}"
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(error) => {
            let _ = ready.send(Err(map_build_error(error)));
            return;
        }
    };

    if let Err(error) = stream.play() {
        let _ = ready.send(Err(CaptureError::Other(format!(
            "failed to start stream: {error}"
        ))));
        return;
    }

    let _ = ready.send(Ok(StreamMeta {
        name,
        sample_rate,
        channels,
    }));

    // Keep the thread (and with it the stream) alive until release.
    while live.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }
    drop(stream);
}

fn map_build_error(error: cpal::BuildStreamError) -> CaptureError {
    match error {
        cpal::BuildStreamError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable("input device disappeared".into())
        }
        other => CaptureError::Other(format!("failed to build input stream: {other}")),
    }
}

struct MicrophoneHandle {
    meta: StreamMeta,
    capturing: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
    thread: Option<JoinHandle<()>>,
}

#[async_trait]
impl DeviceHandle for MicrophoneHandle {
    fn describe(&self) -> DeviceInfo {
        DeviceInfo {
            id: "default-input".into(),
            name: self.meta.name.clone(),
            has_video: false,
            has_audio: true,
        }
    }

    fn supported_encodings(&self) -> Vec<EncodingProfile> {
        vec![EncodingProfile::new(wav::WAV_MIME)]
    }

    async fn open_encoder(
        &self,
        profile: &EncodingProfile,
    ) -> CaptureResult<Box<dyn MediaEncoder>> {
        if profile.mime() != wav::WAV_MIME {
            return Err(CaptureError::EncodingUnsupported { tried: 1 });
        }
        Ok(Box::new(WavMicEncoder {
            capturing: self.capturing.clone(),
            samples: self.samples.clone(),
            sample_rate: self.meta.sample_rate,
            channels: self.meta.channels,
        }))
    }

    fn stop(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        tracing::info!(device = %self.meta.name, "microphone stream released");
    }
}

/// Gates the shared sample buffer and flushes it as a WAV blob.
struct WavMicEncoder {
    capturing: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    channels: u16,
}

#[async_trait]
impl MediaEncoder for WavMicEncoder {
    async fn start(&mut self, _chunk_interval_ms: u64) -> CaptureResult<()> {
        self.samples.lock().clear();
        self.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&mut self) -> CaptureResult<()> {
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> CaptureResult<()> {
        self.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<crate::encoder::MediaBlob> {
        self.capturing.store(false, Ordering::SeqCst);
        let samples = std::mem::take(&mut *self.samples.lock());
        Ok(wav::assemble(&samples, self.sample_rate, self.channels))
    }
}
