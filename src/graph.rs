use crate::band::BandSpec;
use crate::error::PipelineError;
use crate::filter_bank::FilterBank;
use crate::host::{AnalyserNode, AudioHost, DelayNode, DestinationNode, SourceNode};

pub const DEFAULT_WINDOW_SIZE: usize = 512;

/// Playback delay that keeps audible output in step with the analysis
/// snapshot: two main analysis windows.
pub fn output_delay_seconds(window_size: usize, sample_rate: f32) -> f32 {
    window_size as f32 * 2.0 / sample_rate
}

/// The wired topology:
///
/// ```text
/// source -> analyser -> output delay -> destination
///    \---> [band delay -> filter -> gain -> band analyser]  (per band)
/// ```
#[derive(Clone, Debug)]
pub struct AudioGraph {
    pub source: SourceNode,
    pub analyser: AnalyserNode,
    pub output_delay: DelayNode,
    pub destination: DestinationNode,
    pub bank: FilterBank,
    window_size: usize,
    output_delay_seconds: f32,
}

impl AudioGraph {
    /// Create all nodes, then wire them. Window size and band table are
    /// checked before the first connection is made.
    pub fn build<H: AudioHost>(
        host: &mut H,
        window_size: usize,
        bands: &[BandSpec],
    ) -> Result<Self, PipelineError> {
        let analyser = host
            .create_analyser(window_size)
            .map_err(|source| PipelineError::WindowSize {
                window_size,
                source,
            })?;
        let bank = FilterBank::build(bands, host)?;

        let source = host.create_buffer_source()?;
        let delay = output_delay_seconds(window_size, host.sample_rate());
        let output_delay = host.create_delay(delay)?;
        let destination = host.destination();

        host.connect(source.id(), analyser.id())?;
        host.connect(analyser.id(), output_delay.id())?;
        host.connect(output_delay.id(), destination.id())?;
        bank.connect(host, source.id())?;

        log::info!(
            "Audio graph ready: window {} ({} bins), output delay {:.5}s, bands [{}]",
            window_size,
            window_size / 2,
            delay,
            bank.keys().collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            source,
            analyser,
            output_delay,
            destination,
            bank,
            window_size,
            output_delay_seconds: delay,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn bin_count(&self) -> usize {
        self.window_size / 2
    }

    pub fn output_delay_seconds(&self) -> f32 {
        self.output_delay_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{default_bands, FilterType};
    use crate::host::testing::{Created, RecordingHost};

    #[test]
    fn output_delay_is_two_windows() {
        let delay = output_delay_seconds(512, 44100.0);
        assert!((delay - 0.023_219_955).abs() < 1e-6);

        for (window, rate) in [(256, 48000.0), (2048, 22050.0), (512, 96000.0)] {
            let expected = window as f32 * 2.0 / rate;
            assert_eq!(output_delay_seconds(window, rate), expected);
        }
    }

    #[test]
    fn main_path_reaches_destination_through_delay() {
        let mut host = RecordingHost::new(44100.0);
        let graph = AudioGraph::build(&mut host, 1024, &default_bands()).unwrap();

        assert_eq!(
            host.created(graph.analyser.id()),
            &Created::Analyser { window_size: 1024 }
        );
        assert_eq!(host.outputs_of(graph.analyser.id()), vec![graph.output_delay.id()]);
        assert_eq!(
            host.outputs_of(graph.output_delay.id()),
            vec![graph.destination.id()]
        );
        match host.created(graph.output_delay.id()) {
            Created::Delay { delay_time } => {
                assert!((delay_time - 2048.0 / 44100.0).abs() < 1e-7)
            }
            other => panic!("expected delay, got {:?}", other),
        }
    }

    #[test]
    fn only_main_branch_reaches_destination() {
        let mut host = RecordingHost::new(44100.0);
        let graph = AudioGraph::build(&mut host, 512, &default_bands()).unwrap();

        let into_destination: Vec<_> = host
            .edges
            .iter()
            .filter(|(_, to)| *to == graph.destination.id())
            .collect();
        assert_eq!(into_destination.len(), 1);
        assert_eq!(into_destination[0].0, graph.output_delay.id());
    }

    #[test]
    fn source_feeds_main_analyser_and_every_band() {
        let mut host = RecordingHost::new(44100.0);
        let graph = AudioGraph::build(&mut host, 512, &default_bands()).unwrap();

        let mut expected = vec![graph.analyser.id()];
        expected.extend(graph.bank.iter().map(|n| n.delay.id()));
        assert_eq!(host.outputs_of(graph.source.id()), expected);
    }

    #[test]
    fn band_analysers_ignore_main_window_size() {
        let mut host = RecordingHost::new(44100.0);
        let graph = AudioGraph::build(&mut host, 4096, &default_bands()).unwrap();
        for node in graph.bank.iter() {
            assert_eq!(
                host.created(node.analyser.id()),
                &Created::Analyser { window_size: 512 }
            );
        }
    }

    #[test]
    fn rejected_window_size_wires_nothing() {
        let mut host = RecordingHost::new(44100.0);
        let err = AudioGraph::build(&mut host, 1000, &default_bands()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::WindowSize {
                window_size: 1000,
                ..
            }
        ));
        assert!(host.edges.is_empty());
    }

    #[test]
    fn invalid_band_wires_nothing() {
        let mut host = RecordingHost::new(44100.0);
        let bands = vec![BandSpec::new("x", FilterType::Highpass, 2000.0, -1.0, 1.0)];
        assert!(AudioGraph::build(&mut host, 512, &bands).is_err());
        assert!(host.edges.is_empty());
    }
}
