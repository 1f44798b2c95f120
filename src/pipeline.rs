use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;

use crate::audio::{AudioBuffer, HttpLoader, Loader};
use crate::band::{default_bands, BandSpec};
use crate::error::{LoadError, PipelineError};
use crate::graph::{AudioGraph, DEFAULT_WINDOW_SIZE};
use crate::host::AudioHost;
use crate::samples::SampleBuffer;

/// Result handed to a load completion callback.
pub type LoadOutcome = Result<(), LoadError>;

type Callback = Box<dyn FnOnce(LoadOutcome)>;

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub window_size: usize,
    pub bands: Vec<BandSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            bands: default_bands(),
        }
    }
}

impl PipelineConfig {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_bands(mut self, bands: Vec<BandSpec>) -> Self {
        self.bands = bands;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    /// `play()` was requested before any buffer finished loading.
    Pending,
    Playing,
}

struct PendingLoad {
    url: String,
    rx: Receiver<Result<AudioBuffer, LoadError>>,
    on_complete: Option<Callback>,
}

/// Source, analysis graph, snapshot buffers and playback control for one
/// audio host.
pub struct Pipeline<H: AudioHost> {
    host: H,
    graph: AudioGraph,
    samples: SampleBuffer,
    loader: Arc<dyn Loader>,
    /// Playback intent, independent of whether a buffer exists yet.
    playing: bool,
    started: bool,
    loaded: bool,
    pending: Option<PendingLoad>,
}

impl<H: AudioHost> Pipeline<H> {
    /// Default window size and band table.
    pub fn new(host: H) -> Result<Self, PipelineError> {
        Self::initialize(host, &PipelineConfig::default())
    }

    pub fn initialize(mut host: H, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let graph = AudioGraph::build(&mut host, config.window_size, &config.bands)?;
        let samples = SampleBuffer::for_graph(&host, &graph);
        Ok(Self {
            host,
            graph,
            samples,
            loader: Arc::new(HttpLoader::new()),
            playing: false,
            started: false,
            loaded: false,
            pending: None,
        })
    }

    pub fn with_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = loader;
        self
    }

    /// Apply a load that finished since the last tick, then copy the newest
    /// analyser state into the snapshot buffers.
    pub fn update(&mut self) -> &mut Self {
        self.poll();
        self.samples.refresh(&mut self.host, &self.graph);
        self
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    /// Main analyser bin count; the length of `freq` and `time`.
    pub fn size(&self) -> usize {
        self.graph.bin_count()
    }

    pub fn output_delay(&self) -> f32 {
        self.graph.output_delay_seconds()
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn state(&self) -> PlaybackState {
        match (self.started, self.playing) {
            (true, _) => PlaybackState::Playing,
            (false, true) => PlaybackState::Pending,
            (false, false) => PlaybackState::Stopped,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn play(&mut self) -> &mut Self {
        self.playing = true;
        if self.loaded && !self.started {
            self.start_source();
        } else if !self.loaded {
            log::info!("Playback pending until a buffer is loaded");
        }
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.playing = false;
        if self.started {
            self.host.stop(self.graph.source);
            self.started = false;
            log::info!("Playback stopped");
        }
        self
    }

    pub fn load(&mut self, url: &str) -> &mut Self {
        self.spawn_load(url, None)
    }

    /// Like [`Pipeline::load`], calling `on_complete` once the buffer is in
    /// place (and playing, if requested) or the load failed. Superseded
    /// loads never call back.
    pub fn load_with<F>(&mut self, url: &str, on_complete: F) -> &mut Self
    where
        F: FnOnce(LoadOutcome) + 'static,
    {
        self.spawn_load(url, Some(Box::new(on_complete)))
    }

    /// Apply a finished load, if any. Never blocks. [`Pipeline::update`]
    /// does this on every tick.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        let pending = self.pending.as_ref()?;
        let result = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(LoadError::Disconnected(pending.url.clone())),
        };
        Some(self.complete_load(result))
    }

    /// Block until the outstanding load finishes. `None` if nothing is loading.
    pub fn wait_for_load(&mut self) -> Option<LoadOutcome> {
        let pending = self.pending.as_ref()?;
        let result = pending
            .rx
            .recv()
            .unwrap_or_else(|_| Err(LoadError::Disconnected(pending.url.clone())));
        Some(self.complete_load(result))
    }

    fn spawn_load(&mut self, url: &str, on_complete: Option<Callback>) -> &mut Self {
        if let Some(previous) = self.pending.take() {
            log::warn!("Load of {} superseded by {}", previous.url, url);
        }

        let (tx, rx) = mpsc::channel();
        let loader = Arc::clone(&self.loader);
        let worker_url = url.to_string();
        let spawned = std::thread::Builder::new()
            .name("threeband-loader".into())
            .spawn(move || {
                let result = loader.load(&worker_url);
                // The receiver is gone if a newer load replaced this one.
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            log::warn!("Failed to spawn loader thread for {}: {}", url, e);
        }

        self.pending = Some(PendingLoad {
            url: url.to_string(),
            rx,
            on_complete,
        });
        self
    }

    fn complete_load(&mut self, result: Result<AudioBuffer, LoadError>) -> LoadOutcome {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };

        let outcome = result.and_then(|buffer| self.install_buffer(&pending.url, buffer));
        if let Err(ref e) = outcome {
            log::warn!("Load failed: {}", e);
        }

        if let Some(on_complete) = pending.on_complete {
            on_complete(outcome.clone());
        }
        outcome
    }

    /// Replace the source buffer wholesale and resume playback if it was
    /// requested. The previous buffer is stopped first so it never keeps
    /// sounding alongside the new one.
    fn install_buffer(&mut self, url: &str, buffer: AudioBuffer) -> LoadOutcome {
        let was_started = self.started;
        if was_started {
            self.host.stop(self.graph.source);
            self.started = false;
        }

        let duration = buffer.duration();
        if let Err(e) = self.host.set_buffer(self.graph.source, buffer) {
            if was_started && self.playing {
                self.start_source();
            }
            return Err(e.into());
        }
        self.host.set_loop(self.graph.source, true);
        self.loaded = true;
        log::info!("Loaded {} ({:.1}s, looping)", url, duration);

        if self.playing {
            self.start_source();
        }
        Ok(())
    }

    fn start_source(&mut self) {
        self.host.start(self.graph.source);
        self.started = true;
        log::info!("Playback started");
    }
}
