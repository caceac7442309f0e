//! Records a short clip from the default microphone and writes it to
//! `clip.wav`.
//!
//! Run with: `cargo run --example record_clip --features native-devices`

use std::time::Duration;

use anyhow::{Context, Result};
use capture_session::device::microphone::MicrophoneProvider;
use capture_session::{CaptureSession, SessionConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capture_session=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let session = CaptureSession::new(
        SessionConfig::voice(10),
        Box::new(MicrophoneProvider::default()),
    )?;

    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(?event, "session event");
        }
    });

    tracing::info!("recording 5 seconds from the default microphone");
    session.start_recording().await?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    let duration = session.stop_recording().await?;

    let artifact = session
        .artifact()
        .context("artifact missing after stop")?;
    std::fs::write("clip.wav", &artifact.blob.data)?;
    tracing::info!(
        duration_secs = duration,
        bytes = artifact.blob.len(),
        "wrote clip.wav"
    );
    println!("{}", session.snapshot_json());

    session.teardown();
    Ok(())
}
