//! Realtime three-band audio analysis.
//!
//! A [`Pipeline`] wires a looping source through a main spectral analyser
//! and one filtered branch per band (bass, mid, treble by default) on top of
//! an [`AudioHost`], and refreshes fixed-shape byte snapshots of the
//! analysers each time the caller ticks [`Pipeline::update`].

pub mod audio;
pub mod band;
pub mod config;
pub mod error;
pub mod filter_bank;
pub mod graph;
pub mod host;
pub mod pipeline;
pub mod samples;

pub use audio::{AudioBuffer, HttpLoader, Loader};
pub use band::{BandSpec, FilterType};
pub use error::{HostError, LoadError, PipelineError};
pub use host::offline::OfflineHost;
pub use host::AudioHost;
pub use pipeline::{LoadOutcome, Pipeline, PipelineConfig, PlaybackState};
pub use samples::SampleBuffer;
