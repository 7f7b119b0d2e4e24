use clap::Parser;
use pulsefind::detect::BaselinePolicy;
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pulsefind", about = "Find radio-tag pulses in two-channel recordings")]
pub struct Cli {
    /// Input audio files (WAV, FLAC, OGG, MP3); each must have 2 channels
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Write pulses here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Config file (defaults to pulsefind.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Expected pulse width (ms)
    #[arg(long)]
    pub plen: Option<f32>,

    /// Minimum pulse power (dB)
    #[arg(long, allow_negative_numbers = true)]
    pub min_power_db: Option<f32>,

    /// Required excess over the bin baseline (dB)
    #[arg(long)]
    pub margin_db: Option<f32>,

    /// Samples per FFT window
    #[arg(long)]
    pub fft_win_size: Option<usize>,

    /// Lowest monitored frequency (Hz)
    #[arg(long)]
    pub min_freq: Option<f32>,

    /// Highest monitored frequency (Hz)
    #[arg(long)]
    pub max_freq: Option<f32>,

    /// Disable the half-window offset phase
    #[arg(long)]
    pub no_overlap: bool,

    /// Whether pulse samples feed the bin baseline
    #[arg(long, value_enum)]
    pub baseline_policy: Option<BaselinePolicy>,

    /// Samples per block handed to the detector
    #[arg(long)]
    pub block_size: Option<usize>,
}
