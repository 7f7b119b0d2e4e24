use pulsefind::detect::DetectorParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::output::OutputFormat;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorParams,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            block_size: default_block_size(),
        }
    }
}

fn default_block_size() -> usize { 8192 }

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// `--config`, then `./pulsefind.toml`, then the user config directories.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("pulsefind.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("pulsefind").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("pulsefind").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

impl Config {
    /// Command-line values win over the file; the result is clamped to the
    /// legal parameter ranges.
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        let d = &mut self.detector;
        if let Some(v) = cli.plen { d.plen_ms = v; }
        if let Some(v) = cli.min_power_db { d.min_pulse_power_db = v; }
        if let Some(v) = cli.margin_db { d.margin_db = v; }
        if let Some(v) = cli.fft_win_size { d.fft_win_size = v; }
        if let Some(v) = cli.min_freq { d.min_freq_hz = v; }
        if let Some(v) = cli.max_freq { d.max_freq_hz = v; }
        if cli.no_overlap { d.overlap = false; }
        if let Some(v) = cli.baseline_policy { d.baseline_policy = v; }
        if let Some(v) = cli.format { self.output.format = v; }
        if let Some(v) = cli.block_size { self.output.block_size = v; }
        self.detector = self.detector.clamped();
        self
    }
}
