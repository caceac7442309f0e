//! In-memory WAV assembly
//!
//! The native microphone path captures raw PCM and flushes it as a single
//! RIFF/WAVE blob. Samples arrive as f32 and are written out as 16-bit PCM.

use super::MediaBlob;

pub const WAV_MIME: &str = "audio/wav";

const HEADER_LEN: usize = 44;

/// Assemble f32 samples into a 16-bit PCM WAV blob.
pub fn assemble(samples: &[f32], sample_rate: u32, channels: u16) -> MediaBlob {
    let data_len = samples.len() * 2;
    let mut data = Vec::with_capacity(HEADER_LEN + data_len);

    // RIFF header
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
    data.extend_from_slice(b"WAVE");

    // fmt chunk (PCM)
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;
    data.extend_from_slice(b"fmt ");
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes()); // PCM format tag
    data.extend_from_slice(&channels.to_le_bytes());
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&byte_rate.to_le_bytes());
    data.extend_from_slice(&block_align.to_le_bytes());
    data.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    // data chunk
    data.extend_from_slice(b"data");
    data.extend_from_slice(&(data_len as u32).to_le_bytes());
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        data.extend_from_slice(&((clamped * i16::MAX as f32) as i16).to_le_bytes());
    }

    MediaBlob {
        data,
        mime: WAV_MIME.to_string(),
    }
}
