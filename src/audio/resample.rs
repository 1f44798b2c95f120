use anyhow::{Context, Result};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use super::AudioBuffer;

/// Resample mono audio to `target_rate` using rubato. Buffers already at the
/// target rate (and empty ones) are returned as they are.
pub fn resample(buffer: AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if buffer.sample_rate == target_rate || buffer.samples.is_empty() {
        return Ok(AudioBuffer::new(buffer.samples, target_rate));
    }
    if buffer.sample_rate == 0 || target_rate == 0 {
        anyhow::bail!(
            "Cannot resample from {}Hz to {}Hz",
            buffer.sample_rate,
            target_rate
        );
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0,
        params,
        buffer.samples.len(),
        1, // mono
    )
    .context("Failed to create resampler")?;

    let input = vec![buffer.samples];
    let output = resampler
        .process(&input, None)
        .context("Resampling failed")?;

    log::debug!(
        "Resampled {}Hz -> {}Hz ({} samples)",
        buffer.sample_rate,
        target_rate,
        output.first().map_or(0, Vec::len)
    );

    Ok(AudioBuffer::new(
        output.into_iter().next().unwrap_or_default(),
        target_rate,
    ))
}
