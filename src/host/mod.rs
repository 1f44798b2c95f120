//! The audio host: the execution engine that owns the realtime clock and
//! the DSP primitives. The pipeline only creates, parameterizes and wires
//! nodes through this trait and reads analyser state back out of it.

pub mod offline;
#[cfg(test)]
pub mod testing;

use crate::audio::AudioBuffer;
use crate::band::FilterType;
use crate::error::HostError;

/// Opaque index of a node inside a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

macro_rules! node_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name(pub NodeId);

            impl $name {
                pub fn id(self) -> NodeId {
                    self.0
                }
            }
        )*
    };
}

node_handle!(
    /// Looping buffer source.
    SourceNode,
    /// Spectral analyser; passes its input through unchanged.
    AnalyserNode,
    /// Second-order lowpass/highpass/bandpass filter.
    BiquadNode,
    /// Fixed delay line.
    DelayNode,
    /// Linear gain stage.
    GainNode,
    /// Playback sink.
    DestinationNode,
);

pub trait AudioHost {
    /// Sample rate of the processing clock in Hz.
    fn sample_rate(&self) -> f32;

    fn create_buffer_source(&mut self) -> Result<SourceNode, HostError>;
    /// Fails with [`HostError::UnsupportedWindowSize`] if the host cannot
    /// analyse over `window_size` samples.
    fn create_analyser(&mut self, window_size: usize) -> Result<AnalyserNode, HostError>;
    fn create_biquad_filter(
        &mut self,
        filter_type: FilterType,
        frequency: f32,
        q: f32,
    ) -> Result<BiquadNode, HostError>;
    fn create_delay(&mut self, delay_time: f32) -> Result<DelayNode, HostError>;
    fn create_gain(&mut self, gain: f32) -> Result<GainNode, HostError>;
    fn destination(&self) -> DestinationNode;

    /// Route the output of `from` into the input of `to`. Inputs are summed.
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), HostError>;

    fn frequency_bin_count(&self, analyser: AnalyserNode) -> usize;
    fn set_smoothing(&mut self, analyser: AnalyserNode, smoothing: f32);
    /// Copy byte magnitudes of the latest spectrum into `out`, truncating to
    /// whichever of `out` and the bin count is shorter.
    fn byte_frequency_data(&mut self, analyser: AnalyserNode, out: &mut [u8]);
    /// Copy the latest waveform as bytes centered on 128 into `out`.
    fn byte_time_domain_data(&mut self, analyser: AnalyserNode, out: &mut [u8]);

    fn set_buffer(&mut self, source: SourceNode, buffer: AudioBuffer) -> Result<(), HostError>;
    fn set_loop(&mut self, source: SourceNode, looping: bool);
    fn start(&mut self, source: SourceNode);
    fn stop(&mut self, source: SourceNode);
}

/// Window sizes accepted by the bundled hosts.
pub fn is_supported_window_size(window_size: usize) -> bool {
    window_size.is_power_of_two() && (32..=32768).contains(&window_size)
}
