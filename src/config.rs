use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::band::{default_bands, BandSpec};
use crate::pipeline::PipelineConfig;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Replaces the bass/mid/treble table when non-empty.
    #[serde(default)]
    pub bands: Vec<BandSpec>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_seconds")]
    pub seconds: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            seconds: default_seconds(),
        }
    }
}

pub fn default_window_size() -> usize { 512 }
pub fn default_sample_rate() -> u32 { 44100 }
pub fn default_fps() -> u32 { 60 }
pub fn default_seconds() -> f32 { 10.0 }

impl Config {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let bands = if self.bands.is_empty() {
            default_bands()
        } else {
            self.bands.clone()
        };
        PipelineConfig {
            window_size: self.analysis.window_size,
            bands,
        }
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// `threeband.toml` in the working directory, then the platform config dir.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("threeband.toml");
    if local.exists() {
        return Some(local);
    }
    let platform = dirs::config_dir()?.join("threeband").join("config.toml");
    platform.exists().then_some(platform)
}
