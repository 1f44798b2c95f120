use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "threeband", about = "Three-band realtime audio analysis")]
pub struct Cli {
    /// Audio file path or http(s) URL (WAV, MP3, FLAC, OGG)
    pub input: String,

    /// Main analyser window size (power of two, 32-32768)
    #[arg(long, default_value_t = 512)]
    pub window_size: usize,

    /// Processing sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Snapshot ticks per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Seconds of audio to analyse
    #[arg(long, default_value_t = 10.0)]
    pub seconds: f32,

    /// Print each tick as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Config file (defaults to threeband.toml or the platform config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
