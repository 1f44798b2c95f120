use serde::Deserialize;

use crate::error::PipelineError;

/// Window size of every band analyser, independent of the main analyser.
pub const BAND_WINDOW_SIZE: usize = 512;

/// Length of each band's time-domain snapshot.
pub const BAND_BUFFER_LEN: usize = 256;

/// Biquad response used by a band branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// One analysis band: filter parameters plus the gain that offsets the
/// level lost in the filter.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BandSpec {
    pub key: String,
    #[serde(rename = "filter")]
    pub filter_type: FilterType,
    /// Cutoff (low/high pass) or center (band pass) in Hz
    pub frequency: f32,
    pub q: f32,
    #[serde(rename = "gain")]
    pub gain_compensation: f32,
}

impl BandSpec {
    pub fn new(
        key: impl Into<String>,
        filter_type: FilterType,
        frequency: f32,
        q: f32,
        gain_compensation: f32,
    ) -> Self {
        Self {
            key: key.into(),
            filter_type,
            frequency,
            q,
            gain_compensation,
        }
    }

    /// Check the record against the host's sample rate.
    pub fn validate(&self, sample_rate: f32) -> Result<(), PipelineError> {
        let invalid = |reason: String| PipelineError::InvalidBand {
            key: self.key.clone(),
            reason,
        };

        if self.key.trim().is_empty() {
            return Err(invalid("key must not be empty".into()));
        }
        let nyquist = sample_rate / 2.0;
        if !self.frequency.is_finite() || self.frequency <= 0.0 || self.frequency >= nyquist {
            return Err(invalid(format!(
                "frequency {} Hz outside (0, {}) Hz",
                self.frequency, nyquist
            )));
        }
        if !self.q.is_finite() || self.q <= 0.0 {
            return Err(invalid(format!("Q must be positive, got {}", self.q)));
        }
        if !self.gain_compensation.is_finite() || self.gain_compensation <= 0.0 {
            return Err(invalid(format!(
                "gain must be positive, got {}",
                self.gain_compensation
            )));
        }
        Ok(())
    }
}

/// The canonical bass/mid/treble split.
pub fn default_bands() -> Vec<BandSpec> {
    vec![
        BandSpec::new("bass", FilterType::Lowpass, 160.0, 1.2, 2.0),
        BandSpec::new("mid", FilterType::Bandpass, 400.0, 1.2, 4.0),
        BandSpec::new("treble", FilterType::Highpass, 2000.0, 1.2, 3.0),
    ]
}

/// Validate a whole table: every record individually, keys unique, not empty.
pub fn validate_bands(bands: &[BandSpec], sample_rate: f32) -> Result<(), PipelineError> {
    if bands.is_empty() {
        return Err(PipelineError::NoBands);
    }
    for (i, band) in bands.iter().enumerate() {
        band.validate(sample_rate)?;
        if bands[..i].iter().any(|b| b.key == band.key) {
            return Err(PipelineError::DuplicateBand(band.key.clone()));
        }
    }
    Ok(())
}
