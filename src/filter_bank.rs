use crate::band::{validate_bands, BandSpec, BAND_WINDOW_SIZE};
use crate::error::{HostError, PipelineError};
use crate::host::{AnalyserNode, AudioHost, BiquadNode, DelayNode, GainNode, NodeId};

/// Input delay of every band branch, in seconds.
pub const BAND_DELAY_SECONDS: f32 = 0.0;

/// One band branch: delay -> filter -> gain -> analyser.
#[derive(Clone, Debug)]
pub struct FilterNode {
    pub spec: BandSpec,
    pub delay: DelayNode,
    pub filter: BiquadNode,
    pub gain: GainNode,
    pub analyser: AnalyserNode,
}

/// Band branches keyed by band key, in table order.
#[derive(Clone, Debug)]
pub struct FilterBank {
    nodes: Vec<FilterNode>,
}

impl FilterBank {
    /// Create every branch's nodes. Nothing is connected yet; see
    /// [`FilterBank::connect`].
    pub fn build<H: AudioHost>(specs: &[BandSpec], host: &mut H) -> Result<Self, PipelineError> {
        validate_bands(specs, host.sample_rate())?;

        let mut nodes = Vec::with_capacity(specs.len());
        for spec in specs {
            let delay = host.create_delay(BAND_DELAY_SECONDS)?;
            let filter = host.create_biquad_filter(spec.filter_type, spec.frequency, spec.q)?;
            let gain = host.create_gain(spec.gain_compensation)?;
            let analyser = host.create_analyser(BAND_WINDOW_SIZE)?;

            log::debug!(
                "Band '{}': {:?} {} Hz, Q {}, gain {}",
                spec.key,
                spec.filter_type,
                spec.frequency,
                spec.q,
                spec.gain_compensation
            );

            nodes.push(FilterNode {
                spec: spec.clone(),
                delay,
                filter,
                gain,
                analyser,
            });
        }

        Ok(Self { nodes })
    }

    /// Feed every branch directly from `input`, so no band sees another
    /// band's filtering. Band analysers are dead ends.
    pub fn connect<H: AudioHost>(&self, host: &mut H, input: NodeId) -> Result<(), HostError> {
        for node in &self.nodes {
            host.connect(input, node.delay.id())?;
            host.connect(node.delay.id(), node.filter.id())?;
            host.connect(node.filter.id(), node.gain.id())?;
            host.connect(node.gain.id(), node.analyser.id())?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&FilterNode> {
        self.nodes.iter().find(|n| n.spec.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterNode> {
        self.nodes.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.spec.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
