use crate::band::BAND_BUFFER_LEN;
use crate::graph::AudioGraph;
use crate::host::AudioHost;

/// Latest analysis state as flat byte arrays. Allocated once; every
/// refresh overwrites in place.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    freq: Box<[u8]>,
    time: Box<[u8]>,
    filter: Vec<BandSamples>,
}

#[derive(Clone, Debug)]
struct BandSamples {
    key: String,
    time: Box<[u8; BAND_BUFFER_LEN]>,
}

impl SampleBuffer {
    pub fn new<'a>(bin_count: usize, band_keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            freq: vec![0; bin_count].into_boxed_slice(),
            time: vec![0; bin_count].into_boxed_slice(),
            filter: band_keys
                .into_iter()
                .map(|key| BandSamples {
                    key: key.to_string(),
                    time: Box::new([0; BAND_BUFFER_LEN]),
                })
                .collect(),
        }
    }

    /// Main arrays sized by the host's bin count for the main analyser.
    pub fn for_graph<H: AudioHost>(host: &H, graph: &AudioGraph) -> Self {
        Self::new(host.frequency_bin_count(graph.analyser), graph.bank.keys())
    }

    /// Pull the newest frame from every analyser. Main smoothing is reset to
    /// zero first so the spectrum never averages over earlier frames. Bands
    /// only capture the time domain.
    pub fn refresh<H: AudioHost>(&mut self, host: &mut H, graph: &AudioGraph) {
        host.set_smoothing(graph.analyser, 0.0);
        host.byte_frequency_data(graph.analyser, &mut self.freq);
        host.byte_time_domain_data(graph.analyser, &mut self.time);

        for (slot, node) in self.filter.iter_mut().zip(graph.bank.iter()) {
            host.byte_time_domain_data(node.analyser, &mut slot.time[..]);
        }
    }

    /// Main frequency-domain magnitudes, one byte per bin.
    pub fn freq(&self) -> &[u8] {
        &self.freq
    }

    /// Main time-domain waveform, 128 is silence.
    pub fn time(&self) -> &[u8] {
        &self.time
    }

    pub fn band(&self, key: &str) -> Option<&[u8]> {
        self.filter
            .iter()
            .find(|b| b.key == key)
            .map(|b| &b.time[..])
    }

    /// `(key, time-domain bytes)` in band table order.
    pub fn bands(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.filter.iter().map(|b| (b.key.as_str(), &b.time[..]))
    }

    /// RMS deviation of a band's waveform around the 128 midpoint, 0.0-1.0.
    pub fn band_level(&self, key: &str) -> Option<f32> {
        self.band(key).map(waveform_level)
    }
}

fn waveform_level(bytes: &[u8]) -> f32 {
    if bytes.is_empty() {
        return 0.0;
    }
    let sum: f32 = bytes
        .iter()
        .map(|&b| {
            let x = (b as f32 - 128.0) / 128.0;
            x * x
        })
        .sum();
    (sum / bytes.len() as f32).sqrt().min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::default_bands;
    use crate::host::testing::RecordingHost;

    fn graph_with(window_size: usize) -> (RecordingHost, AudioGraph) {
        let mut host = RecordingHost::new(44100.0);
        let graph = AudioGraph::build(&mut host, window_size, &default_bands()).unwrap();
        (host, graph)
    }

    #[test]
    fn shapes_follow_window_size() {
        for window_size in [32, 256, 512, 2048, 32768] {
            let (host, graph) = graph_with(window_size);
            let buffer = SampleBuffer::for_graph(&host, &graph);
            assert_eq!(buffer.freq().len(), window_size / 2);
            assert_eq!(buffer.time().len(), window_size / 2);
            for (_, band) in buffer.bands() {
                assert_eq!(band.len(), 256);
            }
            assert_eq!(buffer.bands().count(), 3);
        }
    }

    #[test]
    fn main_arrays_use_host_bin_count() {
        let (mut host, graph) = graph_with(512);
        host.bin_count = Some(100);
        let buffer = SampleBuffer::for_graph(&host, &graph);
        assert_eq!(buffer.freq().len(), 100);
        assert_eq!(buffer.time().len(), 100);
        assert_eq!(buffer.band("mid").unwrap().len(), 256);
    }

    #[test]
    fn refresh_forces_zero_smoothing_on_main_analyser() {
        let (mut host, graph) = graph_with(512);
        let mut buffer = SampleBuffer::for_graph(&host, &graph);
        buffer.refresh(&mut host, &graph);
        buffer.refresh(&mut host, &graph);
        assert_eq!(
            host.smoothing,
            vec![(graph.analyser.id(), 0.0), (graph.analyser.id(), 0.0)]
        );
    }

    #[test]
    fn refresh_copies_in_place() {
        let (mut host, graph) = graph_with(512);
        let mut buffer = SampleBuffer::for_graph(&host, &graph);
        let freq_ptr = buffer.freq().as_ptr();
        let bass_ptr = buffer.band("bass").unwrap().as_ptr();

        host.advance();
        buffer.refresh(&mut host, &graph);
        assert!(buffer.freq().iter().all(|&b| b == 1));
        assert!(buffer.time().iter().all(|&b| b == 129));
        assert!(buffer.band("treble").unwrap().iter().all(|&b| b == 129));

        assert_eq!(buffer.freq().as_ptr(), freq_ptr);
        assert_eq!(buffer.band("bass").unwrap().as_ptr(), bass_ptr);
    }

    #[test]
    fn unchanged_audio_gives_identical_snapshots() {
        let (mut host, graph) = graph_with(1024);
        let mut buffer = SampleBuffer::for_graph(&host, &graph);
        host.advance();

        buffer.refresh(&mut host, &graph);
        let first = buffer.clone();
        buffer.refresh(&mut host, &graph);

        assert_eq!(first.freq(), buffer.freq());
        assert_eq!(first.time(), buffer.time());
        for ((_, a), (_, b)) in first.bands().zip(buffer.bands()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn waveform_level_of_silence_and_full_scale() {
        assert_eq!(waveform_level(&[128; 256]), 0.0);
        assert!((waveform_level(&[0; 256]) - 1.0).abs() < 1e-6);
        assert_eq!(waveform_level(&[]), 0.0);
    }

    #[test]
    fn unknown_band_is_none() {
        let buffer = SampleBuffer::new(4, ["low"]);
        assert!(buffer.band("high").is_none());
        assert!(buffer.band_level("high").is_none());
        assert_eq!(buffer.band_level("low"), Some(1.0));
    }
}
