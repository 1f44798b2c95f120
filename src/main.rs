mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use cli::Cli;
use threeband::config;
use threeband::{OfflineHost, Pipeline, SampleBuffer};

#[derive(Serialize)]
struct TickSummary<'a> {
    tick: usize,
    time: f32,
    peak_bin: usize,
    peak_hz: f32,
    peak_level: u8,
    bands: Vec<(&'a str, f32)>,
}

impl<'a> TickSummary<'a> {
    fn new(tick: usize, time: f32, samples: &'a SampleBuffer, bin_hz: f32) -> Self {
        let (peak_bin, peak_level) = samples
            .freq()
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|&(_, b)| b)
            .unwrap_or((0, 0));
        let bands = samples
            .bands()
            .map(|(key, _)| (key, samples.band_level(key).unwrap_or(0.0)))
            .collect();
        Self {
            tick,
            time,
            peak_bin,
            peak_hz: peak_bin as f32 * bin_hz,
            peak_level,
            bands,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Config values apply only where the CLI is still at its default
    let config_path = cli.config.clone().or_else(config::find_config);
    let mut bands = None;
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            if cli.window_size == config::default_window_size() { cli.window_size = cfg.analysis.window_size; }
            if cli.sample_rate == config::default_sample_rate() { cli.sample_rate = cfg.analysis.sample_rate; }
            if cli.fps == config::default_fps() { cli.fps = cfg.playback.fps; }
            if cli.seconds == config::default_seconds() { cli.seconds = cfg.playback.seconds; }
            bands = Some(cfg.pipeline_config().bands);
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    if cli.fps == 0 {
        anyhow::bail!("--fps must be at least 1");
    }

    let mut pipeline_config = threeband::PipelineConfig::default().with_window_size(cli.window_size);
    if let Some(bands) = bands {
        pipeline_config = pipeline_config.with_bands(bands);
    }

    log::info!("threeband - three-band audio analysis");
    log::info!("Input: {}", cli.input);
    log::info!("Window: {} @ {}Hz, {} ticks/s", cli.window_size, cli.sample_rate, cli.fps);

    let host = OfflineHost::new(cli.sample_rate as f32);
    let mut pipeline = Pipeline::initialize(host, &pipeline_config)
        .context("Failed to build analysis pipeline")?;

    pipeline.play().load(&cli.input);
    match pipeline.wait_for_load() {
        Some(Ok(())) => {}
        Some(Err(e)) => return Err(e).with_context(|| format!("Failed to load {}", cli.input)),
        None => anyhow::bail!("No load in progress"),
    }

    let frames_per_tick = (cli.sample_rate / cli.fps).max(1) as usize;
    let total_ticks = (cli.seconds * cli.fps as f32).ceil() as usize;
    let bin_hz = cli.sample_rate as f32 / cli.window_size as f32;

    for tick in 0..total_ticks {
        pipeline.host_mut().render(frames_per_tick);
        pipeline.update();

        let time = pipeline.host().current_time() as f32;
        let summary = TickSummary::new(tick, time, pipeline.samples(), bin_hz);

        if cli.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            let levels: Vec<String> = summary
                .bands
                .iter()
                .map(|(key, level)| format!("{}={:.3}", key, level))
                .collect();
            println!(
                "{:6} {:8.3}s  peak {:7.1}Hz ({:3})  {}",
                summary.tick,
                summary.time,
                summary.peak_hz,
                summary.peak_level,
                levels.join("  ")
            );
        }
    }

    pipeline.stop();
    log::info!("Done: {} ticks", total_ticks);
    Ok(())
}
