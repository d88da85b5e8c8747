//! Sample-rate and channel conversion for captured audio

/// Average interleaved channels down to mono
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio with linear interpolation
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = ((samples.len() as f64) / ratio).floor() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = position.floor() as usize;
            let frac = (position - index as f64) as f32;

            let current = samples[index.min(last)];
            let next = samples[(index + 1).min(last)];
            current + (next - current) * frac
        })
        .collect()
}
