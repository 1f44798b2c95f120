//! In-process reference host. Nothing runs on its own: the caller advances
//! the clock with [`OfflineHost::render`], which pulls samples from every
//! source through the graph in topological order.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::{
    is_supported_window_size, AnalyserNode, AudioHost, BiquadNode, DelayNode, DestinationNode,
    GainNode, NodeId, SourceNode,
};
use crate::audio::{resample, AudioBuffer};
use crate::band::FilterType;
use crate::error::HostError;

/// Samples processed per graph pass.
const RENDER_QUANTUM: usize = 128;

const DEFAULT_SMOOTHING: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Delay lines can hold at least this much audio.
const MIN_DELAY_CAPACITY_SECONDS: f32 = 1.0;

pub struct OfflineHost {
    sample_rate: f32,
    nodes: Vec<Node>,
    /// Processing order; every node appears after all of its inputs.
    order: Vec<usize>,
    destination: DestinationNode,
    frames_rendered: u64,
    mix: Vec<f32>,
}

struct Node {
    kind: NodeKind,
    inputs: Vec<NodeId>,
    output: Vec<f32>,
}

enum NodeKind {
    Source(BufferSource),
    Analyser(Analyser),
    Biquad(Biquad),
    Delay(DelayLine),
    Gain(f32),
    Destination,
}

impl NodeKind {
    fn name(&self) -> &'static str {
        match self {
            NodeKind::Source(_) => "source",
            NodeKind::Analyser(_) => "analyser",
            NodeKind::Biquad(_) => "biquad filter",
            NodeKind::Delay(_) => "delay",
            NodeKind::Gain(_) => "gain",
            NodeKind::Destination => "destination",
        }
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        match self {
            NodeKind::Source(source) => source.process(output),
            NodeKind::Analyser(analyser) => {
                analyser.push(input);
                output.copy_from_slice(input);
            }
            NodeKind::Biquad(filter) => {
                for (out, &x) in output.iter_mut().zip(input) {
                    *out = filter.process(x);
                }
            }
            NodeKind::Delay(delay) => {
                for (out, &x) in output.iter_mut().zip(input) {
                    *out = delay.process(x);
                }
            }
            NodeKind::Gain(gain) => {
                for (out, &x) in output.iter_mut().zip(input) {
                    *out = x * *gain;
                }
            }
            NodeKind::Destination => output.copy_from_slice(input),
        }
    }
}

impl OfflineHost {
    pub fn new(sample_rate: f32) -> Self {
        let mut host = Self {
            sample_rate,
            nodes: Vec::new(),
            order: Vec::new(),
            destination: DestinationNode(NodeId(0)),
            frames_rendered: 0,
            mix: Vec::with_capacity(RENDER_QUANTUM),
        };
        host.destination = DestinationNode(host.add(NodeKind::Destination));
        host
    }

    /// Advance the clock by `frames` samples.
    pub fn render(&mut self, frames: usize) {
        let mut remaining = frames;
        while remaining > 0 {
            let len = remaining.min(RENDER_QUANTUM);
            self.render_quantum(len);
            remaining -= len;
        }
        self.frames_rendered += frames as u64;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Playback position in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    /// Samples that reached the destination during the most recent quantum.
    pub fn last_output(&self) -> &[f32] {
        &self.nodes[self.destination.id().0].output
    }

    pub fn is_playing(&self, source: SourceNode) -> bool {
        match self.nodes.get(source.id().0).map(|n| &n.kind) {
            Some(NodeKind::Source(s)) => s.playing,
            _ => false,
        }
    }

    fn render_quantum(&mut self, len: usize) {
        for i in 0..self.order.len() {
            let idx = self.order[i];

            self.mix.clear();
            self.mix.resize(len, 0.0);
            for input in &self.nodes[idx].inputs {
                for (acc, s) in self.mix.iter_mut().zip(&self.nodes[input.0].output) {
                    *acc += s;
                }
            }

            let Node { kind, output, .. } = &mut self.nodes[idx];
            output.clear();
            output.resize(len, 0.0);
            kind.process(&self.mix, output);
        }
    }

    fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        log::debug!("Created {} node {:?}", kind.name(), id);
        self.nodes.push(Node {
            kind,
            inputs: Vec::new(),
            output: Vec::with_capacity(RENDER_QUANTUM),
        });
        self.order.push(id.0);
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeKind, HostError> {
        self.nodes
            .get_mut(id.0)
            .map(|n| &mut n.kind)
            .ok_or(HostError::UnknownNode(id))
    }

    fn source_mut(&mut self, source: SourceNode) -> Option<&mut BufferSource> {
        match self.node_mut(source.id()) {
            Ok(NodeKind::Source(s)) => Some(s),
            _ => {
                log::warn!("{:?} is not a source node", source.id());
                None
            }
        }
    }

    fn analyser_mut(&mut self, analyser: AnalyserNode) -> Option<&mut Analyser> {
        match self.node_mut(analyser.id()) {
            Ok(NodeKind::Analyser(a)) => Some(a),
            _ => None,
        }
    }

    /// True if `target` feeds, directly or transitively, into `node`.
    fn is_upstream(&self, target: NodeId, node: NodeId) -> bool {
        let mut stack = vec![node];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if std::mem::replace(&mut seen[current.0], true) {
                continue;
            }
            stack.extend(self.nodes[current.0].inputs.iter().copied());
        }
        false
    }

    fn rebuild_order(&mut self) {
        fn visit(nodes: &[Node], idx: usize, seen: &mut [bool], order: &mut Vec<usize>) {
            if std::mem::replace(&mut seen[idx], true) {
                return;
            }
            for input in &nodes[idx].inputs {
                visit(nodes, input.0, seen, order);
            }
            order.push(idx);
        }

        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        for idx in 0..self.nodes.len() {
            visit(&self.nodes, idx, &mut seen, &mut order);
        }
        self.order = order;
    }
}

impl AudioHost for OfflineHost {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn create_buffer_source(&mut self) -> Result<SourceNode, HostError> {
        Ok(SourceNode(self.add(NodeKind::Source(BufferSource::default()))))
    }

    fn create_analyser(&mut self, window_size: usize) -> Result<AnalyserNode, HostError> {
        if !is_supported_window_size(window_size) {
            return Err(HostError::UnsupportedWindowSize(window_size));
        }
        Ok(AnalyserNode(self.add(NodeKind::Analyser(Analyser::new(window_size)))))
    }

    fn create_biquad_filter(
        &mut self,
        filter_type: FilterType,
        frequency: f32,
        q: f32,
    ) -> Result<BiquadNode, HostError> {
        if !(frequency > 0.0 && frequency < self.sample_rate / 2.0) {
            return Err(HostError::InvalidParameter {
                name: "filter frequency",
                value: frequency,
            });
        }
        if !(q > 0.0) {
            return Err(HostError::InvalidParameter { name: "Q", value: q });
        }
        let coeffs = BiquadCoeffs::new(filter_type, self.sample_rate, frequency, q);
        Ok(BiquadNode(self.add(NodeKind::Biquad(Biquad::new(coeffs)))))
    }

    fn create_delay(&mut self, delay_time: f32) -> Result<DelayNode, HostError> {
        if !(delay_time >= 0.0 && delay_time.is_finite()) {
            return Err(HostError::InvalidParameter {
                name: "delay time",
                value: delay_time,
            });
        }
        let delay_samples = (delay_time * self.sample_rate).round() as usize;
        let capacity = delay_samples.max((MIN_DELAY_CAPACITY_SECONDS * self.sample_rate) as usize);
        Ok(DelayNode(self.add(NodeKind::Delay(DelayLine::new(delay_samples, capacity)))))
    }

    fn create_gain(&mut self, gain: f32) -> Result<GainNode, HostError> {
        if !gain.is_finite() {
            return Err(HostError::InvalidParameter { name: "gain", value: gain });
        }
        Ok(GainNode(self.add(NodeKind::Gain(gain))))
    }

    fn destination(&self) -> DestinationNode {
        self.destination
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), HostError> {
        if from.0 >= self.nodes.len() {
            return Err(HostError::UnknownNode(from));
        }
        if to.0 >= self.nodes.len() {
            return Err(HostError::UnknownNode(to));
        }
        if matches!(self.nodes[to.0].kind, NodeKind::Source(_)) {
            return Err(HostError::WrongNodeKind(to, "a connection target"));
        }
        if self.is_upstream(to, from) {
            return Err(HostError::Cycle { from, to });
        }
        if self.nodes[to.0].inputs.contains(&from) {
            return Ok(());
        }

        self.nodes[to.0].inputs.push(from);
        self.rebuild_order();
        log::debug!("Connected {:?} -> {:?}", from, to);
        Ok(())
    }

    fn frequency_bin_count(&self, analyser: AnalyserNode) -> usize {
        match self.nodes.get(analyser.id().0).map(|n| &n.kind) {
            Some(NodeKind::Analyser(a)) => a.window_size / 2,
            _ => 0,
        }
    }

    fn set_smoothing(&mut self, analyser: AnalyserNode, smoothing: f32) {
        if let Some(a) = self.analyser_mut(analyser) {
            a.smoothing = smoothing.clamp(0.0, 1.0);
        }
    }

    fn byte_frequency_data(&mut self, analyser: AnalyserNode, out: &mut [u8]) {
        if let Some(a) = self.analyser_mut(analyser) {
            a.byte_frequency_data(out);
        }
    }

    fn byte_time_domain_data(&mut self, analyser: AnalyserNode, out: &mut [u8]) {
        if let Some(a) = self.analyser_mut(analyser) {
            a.byte_time_domain_data(out);
        }
    }

    fn set_buffer(&mut self, source: SourceNode, buffer: AudioBuffer) -> Result<(), HostError> {
        if !matches!(self.node_mut(source.id())?, NodeKind::Source(_)) {
            return Err(HostError::WrongNodeKind(source.id(), "a source"));
        }

        let target_rate = self.sample_rate.round() as u32;
        let buffer = if buffer.sample_rate != target_rate {
            log::info!(
                "Resampling buffer from {}Hz to host rate {}Hz",
                buffer.sample_rate,
                target_rate
            );
            resample(buffer, target_rate).map_err(|e| HostError::Resample(format!("{:#}", e)))?
        } else {
            buffer
        };

        match self.node_mut(source.id())? {
            NodeKind::Source(s) => {
                s.samples = buffer.samples.into();
                s.position = 0;
                Ok(())
            }
            _ => Err(HostError::WrongNodeKind(source.id(), "a source")),
        }
    }

    fn set_loop(&mut self, source: SourceNode, looping: bool) {
        if let Some(s) = self.source_mut(source) {
            s.looping = looping;
        }
    }

    fn start(&mut self, source: SourceNode) {
        if let Some(s) = self.source_mut(source) {
            s.position = 0;
            s.playing = true;
        }
    }

    fn stop(&mut self, source: SourceNode) {
        if let Some(s) = self.source_mut(source) {
            s.playing = false;
        }
    }
}

struct BufferSource {
    samples: Arc<[f32]>,
    position: usize,
    looping: bool,
    playing: bool,
}

impl Default for BufferSource {
    fn default() -> Self {
        Self {
            samples: Arc::from(Vec::new()),
            position: 0,
            looping: false,
            playing: false,
        }
    }
}

impl BufferSource {
    fn process(&mut self, output: &mut [f32]) {
        for out in output.iter_mut() {
            if !self.playing || self.samples.is_empty() {
                *out = 0.0;
                continue;
            }
            if self.position >= self.samples.len() {
                if self.looping {
                    self.position = 0;
                } else {
                    self.playing = false;
                    *out = 0.0;
                    continue;
                }
            }
            *out = self.samples[self.position];
            self.position += 1;
        }
    }
}

/// Analyser with conventional byte output: Blackman-windowed FFT of the
/// latest `window_size` samples, exponentially smoothed magnitudes, decibels
/// mapped from [MIN_DECIBELS, MAX_DECIBELS] onto 0..=255.
struct Analyser {
    window_size: usize,
    smoothing: f32,
    /// Ring of the most recent samples; `write` points at the oldest.
    history: Vec<f32>,
    write: usize,
    /// Bumped whenever new samples arrive.
    generation: u64,
    analysed_generation: Option<u64>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl Analyser {
    fn new(window_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            window_size,
            smoothing: DEFAULT_SMOOTHING,
            history: vec![0.0; window_size],
            write: 0,
            generation: 0,
            analysed_generation: None,
            fft,
            window: blackman_window(window_size),
            spectrum: vec![Complex::new(0.0, 0.0); window_size],
            scratch,
            magnitudes: vec![0.0; window_size / 2],
        }
    }

    fn push(&mut self, input: &[f32]) {
        for &s in input {
            self.history[self.write] = s;
            self.write = (self.write + 1) % self.window_size;
        }
        self.generation += 1;
    }

    /// Chronological view of the history, oldest first.
    fn latest(&self) -> impl Iterator<Item = f32> + '_ {
        self.history[self.write..]
            .iter()
            .chain(&self.history[..self.write])
            .copied()
    }

    fn analyse(&mut self) {
        if self.analysed_generation == Some(self.generation) {
            return;
        }

        let (newest, oldest) = self.history.split_at(self.write);
        let samples = oldest.iter().chain(newest);
        for ((bin, &s), &w) in self.spectrum.iter_mut().zip(samples).zip(&self.window) {
            *bin = Complex::new(s * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let scale = 1.0 / self.window_size as f32;
        let tau = self.smoothing;
        for (mag, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *mag = tau * *mag + (1.0 - tau) * bin.norm() * scale;
        }
        self.analysed_generation = Some(self.generation);
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.analyse();
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (byte, &mag) in out.iter_mut().zip(&self.magnitudes) {
            let db = 20.0 * mag.log10();
            let scaled = 255.0 / range * (db - MIN_DECIBELS);
            *byte = if scaled.is_nan() { 0 } else { scaled.clamp(0.0, 255.0) as u8 };
        }
    }

    fn byte_time_domain_data(&self, out: &mut [u8]) {
        for (byte, s) in out.iter_mut().zip(self.latest()) {
            *byte = (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8;
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Normalized RBJ cookbook coefficients.
#[derive(Clone, Debug)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    fn new(filter_type: FilterType, sample_rate: f32, frequency: f32, q: f32) -> Self {
        let omega = 2.0 * PI * frequency / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * q);

        let (b0, b1, b2) = match filter_type {
            FilterType::Lowpass => (
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
            ),
            FilterType::Highpass => (
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
            ),
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

struct Biquad {
    coeffs: BiquadCoeffs,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

struct DelayLine {
    buffer: Vec<f32>,
    delay: usize,
    write_pos: usize,
}

impl DelayLine {
    fn new(delay: usize, capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(delay) + 1],
            delay,
            write_pos: 0,
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        let len = self.buffer.len();
        self.buffer[self.write_pos] = x;
        let y = self.buffer[(self.write_pos + len - self.delay) % len];
        self.write_pos = (self.write_pos + 1) % len;
        y
    }
}
