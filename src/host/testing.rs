//! Recording test double for [`AudioHost`].

use super::*;

#[derive(Clone, Debug, PartialEq)]
pub enum Created {
    Source,
    Analyser { window_size: usize },
    Biquad { filter_type: FilterType, frequency: f32, q: f32 },
    Delay { delay_time: f32 },
    Gain { gain: f32 },
    Destination,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    SetBuffer { len: usize },
    SetLoop(bool),
    /// Carries the length of the buffer that was loaded when playback began.
    Start { buffer_len: Option<usize> },
    Stop,
}

/// Records every call. Analysers report `frame` as every frequency byte and
/// `128 + frame` as every time-domain byte, so output only changes when a
/// test calls [`RecordingHost::advance`].
pub struct RecordingHost {
    pub sample_rate: f32,
    pub nodes: Vec<Created>,
    pub edges: Vec<(NodeId, NodeId)>,
    pub events: Vec<Event>,
    pub smoothing: Vec<(NodeId, f32)>,
    pub frame: u8,
    /// Reported bin count for every analyser, instead of `window_size / 2`.
    pub bin_count: Option<usize>,
    buffer_len: Option<usize>,
}

impl RecordingHost {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            nodes: vec![Created::Destination],
            edges: Vec::new(),
            events: Vec::new(),
            smoothing: Vec::new(),
            frame: 0,
            bin_count: None,
            buffer_len: None,
        }
    }

    /// Simulate the engine producing new audio.
    pub fn advance(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }

    pub fn starts(&self) -> Vec<Option<usize>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Start { buffer_len } => Some(*buffer_len),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self, id: NodeId) -> &Created {
        &self.nodes[id.0]
    }

    /// Nodes fed by `id`, in connection order.
    pub fn outputs_of(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(from, _)| *from == id)
            .map(|(_, to)| *to)
            .collect()
    }

    fn push(&mut self, created: Created) -> NodeId {
        self.nodes.push(created);
        NodeId(self.nodes.len() - 1)
    }
}

impl AudioHost for RecordingHost {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn create_buffer_source(&mut self) -> Result<SourceNode, HostError> {
        Ok(SourceNode(self.push(Created::Source)))
    }

    fn create_analyser(&mut self, window_size: usize) -> Result<AnalyserNode, HostError> {
        if !is_supported_window_size(window_size) {
            return Err(HostError::UnsupportedWindowSize(window_size));
        }
        Ok(AnalyserNode(self.push(Created::Analyser { window_size })))
    }

    fn create_biquad_filter(
        &mut self,
        filter_type: FilterType,
        frequency: f32,
        q: f32,
    ) -> Result<BiquadNode, HostError> {
        Ok(BiquadNode(self.push(Created::Biquad {
            filter_type,
            frequency,
            q,
        })))
    }

    fn create_delay(&mut self, delay_time: f32) -> Result<DelayNode, HostError> {
        Ok(DelayNode(self.push(Created::Delay { delay_time })))
    }

    fn create_gain(&mut self, gain: f32) -> Result<GainNode, HostError> {
        Ok(GainNode(self.push(Created::Gain { gain })))
    }

    fn destination(&self) -> DestinationNode {
        DestinationNode(NodeId(0))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), HostError> {
        self.edges.push((from, to));
        Ok(())
    }

    fn frequency_bin_count(&self, analyser: AnalyserNode) -> usize {
        match self.created(analyser.id()) {
            Created::Analyser { window_size } => self.bin_count.unwrap_or(window_size / 2),
            _ => 0,
        }
    }

    fn set_smoothing(&mut self, analyser: AnalyserNode, smoothing: f32) {
        self.smoothing.push((analyser.id(), smoothing));
    }

    fn byte_frequency_data(&mut self, _analyser: AnalyserNode, out: &mut [u8]) {
        out.fill(self.frame);
    }

    fn byte_time_domain_data(&mut self, _analyser: AnalyserNode, out: &mut [u8]) {
        out.fill(128u8.wrapping_add(self.frame));
    }

    fn set_buffer(&mut self, _source: SourceNode, buffer: AudioBuffer) -> Result<(), HostError> {
        self.buffer_len = Some(buffer.samples.len());
        self.events.push(Event::SetBuffer {
            len: buffer.samples.len(),
        });
        Ok(())
    }

    fn set_loop(&mut self, _source: SourceNode, looping: bool) {
        self.events.push(Event::SetLoop(looping));
    }

    fn start(&mut self, _source: SourceNode) {
        self.events.push(Event::Start {
            buffer_len: self.buffer_len,
        });
    }

    fn stop(&mut self, _source: SourceNode) {
        self.events.push(Event::Stop);
    }
}
