//! PCM codec shared by the capture and playback paths.
//!
//! Audio travels as 16-bit signed little-endian PCM, base64-encoded for the
//! text-oriented model channel.

use base64::Engine;

/// Scale factor between float samples and 16-bit PCM
pub const PCM_SCALE: f32 = 32768.0;

/// Convert float samples to 16-bit little-endian PCM bytes.
///
/// Each sample is scaled by 32768 and truncated. Values outside [-1, 1]
/// wrap around instead of clipping (1.0 becomes -32768).
pub fn float_to_pcm_bytes(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| {
            // Truncate toward zero, then wrap into 16 bits
            let value = (s * PCM_SCALE) as i32 as i16;
            value.to_le_bytes()
        })
        .collect()
}

/// Convert interleaved 16-bit little-endian PCM bytes to per-channel floats.
///
/// A trailing odd byte or an incomplete last frame is ignored.
pub fn pcm_bytes_to_float(bytes: &[u8], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels.max(1) as usize;
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let frame_count = samples.len() / channels;
    let mut output = vec![Vec::with_capacity(frame_count); channels];

    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in frame.iter().enumerate() {
            output[channel].push(sample as f32 / PCM_SCALE);
        }
    }

    output
}

/// Encode raw bytes as standard base64 text
pub fn bytes_to_portable_text(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode standard base64 text back into raw bytes
pub fn portable_text_to_bytes(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(text)
}

/// MIME type announced for PCM captured at `sample_rate`
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Parse the `rate=` parameter of a PCM MIME type, if present
pub fn sample_rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}
