mod cli;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::io::{BufWriter, Write};
use std::path::Path;

use cli::Cli;
use config::Config;
use output::PulseWriter;
use pulsefind::audio::decode::decode_stereo;
use pulsefind::detect::{DetectorParams, FeatureSet, PulseDetector, StreamLayout};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let file_config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(e) if cli.config.is_some() => {
                return Err(e.context(format!("Failed to load config from {}", path.display())));
            }
            Err(e) => {
                log::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Config::default()
            }
        },
        None => Config::default(),
    };
    let cfg = file_config.merge_cli(&cli);
    let block_size = cfg.output.block_size;

    log::info!("pulsefind - {} input file(s), block size {}", cli.inputs.len(), block_size);

    let pb = ProgressBar::new(cli.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    // One detector per file; files run in parallel.
    let results: Vec<(&Path, Result<FeatureSet>)> = cli
        .inputs
        .par_iter()
        .map(|path| {
            let result = detect_file(path, &cfg.detector, block_size);
            pb.inc(1);
            (path.as_path(), result)
        })
        .collect();
    pb.finish_and_clear();

    let out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = PulseWriter::new(cfg.output.format, out);

    let mut failures = 0;
    for (path, result) in &results {
        match result {
            Ok(features) => {
                log::info!("{}: {} pulses", path.display(), features.len());
                writer.write(&path.display().to_string(), features)?;
            }
            Err(e) => {
                log::error!("{}: {:#}", path.display(), e);
                failures += 1;
            }
        }
    }
    writer.flush()?;

    if failures > 0 {
        anyhow::bail!("{} of {} input files failed", failures, results.len());
    }
    Ok(())
}

fn detect_file(path: &Path, params: &DetectorParams, block_size: usize) -> Result<FeatureSet> {
    let audio = decode_stereo(path)?;
    let mut detector = PulseDetector::initialise(
        audio.sample_rate as f32,
        params,
        StreamLayout::stereo(block_size),
    )
    .with_context(|| format!("Cannot configure detector for {}", path.display()))?;

    let sample_rate = audio.sample_rate as f64;
    let mut features = FeatureSet::new();
    for (i, block) in audio.blocks(block_size).enumerate() {
        let timestamp = (i * block_size) as f64 / sample_rate;
        features.extend(detector.process(&block, timestamp)?);
    }
    features.extend(detector.remaining_features()?);

    log::debug!(
        "{}: {:.1}s analysed, {} pulses",
        path.display(),
        audio.duration(),
        features.len()
    );
    Ok(features)
}
