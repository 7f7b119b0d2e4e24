use serde::Serialize;

use super::finder::BinPulse;
use super::params::power_to_db;

/// One detected pulse in caller units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulseFeature {
    pub channel: usize,
    pub bin: usize,
    /// Centre frequency of the bin (Hz)
    pub frequency_hz: f32,
    /// Centre of the first window of the pulse (s)
    pub onset: f64,
    /// Centre of the first to centre of the last window (s)
    pub duration: f64,
    pub windows: usize,
    pub peak_db: f32,
    pub baseline_db: f32,
    pub truncated: bool,
}

/// Pulses of one processing step, ordered by onset, then channel, then bin.
pub type FeatureSet = Vec<PulseFeature>;

/// Maps window counts to stream time and orders the pulses of a step.
#[derive(Debug, Clone)]
pub struct PulseAggregator {
    sample_rate: f64,
    hop: usize,
    half_window: usize,
    bin_hz: f32,
    origin: f64,
    pending: Vec<(usize, usize, BinPulse)>,
}

impl PulseAggregator {
    pub fn new(sample_rate: f32, fft_win_size: usize, hop: usize) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            hop,
            half_window: fft_win_size / 2,
            bin_hz: sample_rate / fft_win_size as f32,
            origin: 0.0,
            pending: Vec::new(),
        }
    }

    /// Stream time of the first sample (s).
    pub fn set_origin(&mut self, origin: f64) {
        self.origin = origin;
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_hz
    }

    /// Time of the centre of window `window`.
    pub fn window_time(&self, window: u64) -> f64 {
        let centre = window as f64 * self.hop as f64 + self.half_window as f64;
        self.origin + centre / self.sample_rate
    }

    pub fn collect(&mut self, channel: usize, bin: usize, pulse: BinPulse) {
        self.pending.push((channel, bin, pulse));
    }

    pub fn finish(&mut self) -> FeatureSet {
        let pending = std::mem::take(&mut self.pending);
        let mut features: FeatureSet = pending
            .into_iter()
            .map(|(channel, bin, pulse)| PulseFeature {
                channel,
                bin,
                frequency_hz: self.bin_frequency(bin),
                onset: self.window_time(pulse.onset_window),
                duration: (pulse.windows.saturating_sub(1) * self.hop) as f64 / self.sample_rate,
                windows: pulse.windows,
                peak_db: power_to_db(pulse.peak_power),
                baseline_db: power_to_db(pulse.baseline),
                truncated: pulse.truncated,
            })
            .collect();
        features.sort_by(|a, b| {
            a.onset
                .total_cmp(&b.onset)
                .then(a.channel.cmp(&b.channel))
                .then(a.bin.cmp(&b.bin))
        });
        features
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.origin = 0.0;
    }
}
