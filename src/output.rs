use anyhow::Result;
use pulsefind::detect::PulseFeature;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    /// One JSON object per line
    Json,
}

/// One output row: a pulse plus the file it came from.
#[derive(Debug, Serialize)]
struct PulseRecord<'a> {
    file: &'a str,
    channel: usize,
    bin: usize,
    frequency_hz: f32,
    onset: f64,
    duration: f64,
    windows: usize,
    peak_db: f32,
    baseline_db: f32,
    truncated: bool,
}

impl<'a> PulseRecord<'a> {
    fn new(file: &'a str, f: &PulseFeature) -> Self {
        Self {
            file,
            channel: f.channel,
            bin: f.bin,
            frequency_hz: f.frequency_hz,
            onset: f.onset,
            duration: f.duration,
            windows: f.windows,
            peak_db: f.peak_db,
            baseline_db: f.baseline_db,
            truncated: f.truncated,
        }
    }
}

pub enum PulseWriter<W: Write> {
    Csv(csv::Writer<W>),
    Json(W),
}

impl<W: Write> PulseWriter<W> {
    pub fn new(format: OutputFormat, out: W) -> Self {
        match format {
            OutputFormat::Csv => PulseWriter::Csv(csv::Writer::from_writer(out)),
            OutputFormat::Json => PulseWriter::Json(out),
        }
    }

    pub fn write(&mut self, file: &str, features: &[PulseFeature]) -> Result<()> {
        for feature in features {
            let record = PulseRecord::new(file, feature);
            match self {
                PulseWriter::Csv(w) => w.serialize(&record)?,
                PulseWriter::Json(w) => {
                    serde_json::to_writer(&mut *w, &record)?;
                    w.write_all(b"\n")?;
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            PulseWriter::Csv(w) => w.flush()?,
            PulseWriter::Json(w) => w.flush()?,
        }
        Ok(())
    }
}
