use std::ops::RangeInclusive;

use super::aggregate::{FeatureSet, PulseAggregator};
use super::error::{ConfigError, DetectorError};
use super::finder::BinPulseFinder;
use super::params::{
    db_to_power, max_excluded_windows, min_pulse_windows, pulse_windows, DetectorParams,
};
use super::spectrum::SpectralPowerEngine;
use super::window::Windower;

pub const CHANNELS: usize = 2;

/// How the caller will deliver audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLayout {
    pub channels: usize,
    /// New samples per block; the first `step_size` samples of each block
    /// are consumed.
    pub step_size: usize,
    pub block_size: usize,
}

impl StreamLayout {
    pub fn stereo(block_size: usize) -> Self {
        Self {
            channels: CHANNELS,
            step_size: block_size,
            block_size,
        }
    }
}

/// Streaming pulse detector for one two-channel audio stream.
///
/// Blocks go in through [`process`](Self::process) in stream order; pulses
/// come out once they end. [`remaining_features`](Self::remaining_features)
/// closes the stream.
pub struct PulseDetector {
    params: DetectorParams,
    layout: StreamLayout,
    bins: RangeInclusive<usize>,
    pf_size: usize,
    min_windows: usize,
    windower: Windower,
    engine: SpectralPowerEngine,
    finders: Vec<Vec<BinPulseFinder>>, // channel -> bin - first bin
    aggregator: PulseAggregator,
    next_window: u64,
    started: bool,
    frame: Vec<f32>,
}

impl PulseDetector {
    /// Validate the configuration and allocate all per-stream state.
    pub fn initialise(
        sample_rate: f32,
        params: &DetectorParams,
        layout: StreamLayout,
    ) -> Result<Self, DetectorError> {
        if layout.channels != CHANNELS {
            return Err(ConfigError::UnsupportedChannelCount {
                expected: CHANNELS,
                actual: layout.channels,
            }
            .into());
        }
        if layout.step_size == 0 || layout.step_size > layout.block_size {
            return Err(ConfigError::InvalidBlockLayout {
                step_size: layout.step_size,
                block_size: layout.block_size,
            }
            .into());
        }
        let bins = params.validate(sample_rate)?;
        if params.fft_win_size > layout.block_size {
            return Err(ConfigError::WindowTooLarge {
                window: params.fft_win_size,
                block: layout.block_size,
            }
            .into());
        }

        let hop = params.hop();
        let pf_size = pulse_windows(params.plen_ms, sample_rate, hop);
        let min_windows = min_pulse_windows(pf_size);
        let max_excluded = max_excluded_windows(pf_size);
        let margin = db_to_power(params.margin_db);
        let floor = db_to_power(params.min_pulse_power_db);

        let windower = Windower::new(params.fft_win_size, CHANNELS, params.phases());
        let engine = SpectralPowerEngine::new(windower.taper(), bins.clone());
        let finders: Vec<Vec<BinPulseFinder>> = (0..CHANNELS)
            .map(|_| {
                bins.clone()
                    .map(|_| {
                        BinPulseFinder::new(
                            pf_size,
                            margin,
                            floor,
                            min_windows,
                            max_excluded,
                            params.baseline_policy,
                        )
                    })
                    .collect()
            })
            .collect();
        let aggregator = PulseAggregator::new(sample_rate, params.fft_win_size, hop);

        log::info!(
            "Pulse detector: {}Hz, {}-point windows, hop {}, bins {}..={} ({:.1}-{:.1}Hz)",
            sample_rate,
            params.fft_win_size,
            hop,
            bins.start(),
            bins.end(),
            aggregator.bin_frequency(*bins.start()),
            aggregator.bin_frequency(*bins.end()),
        );
        log::info!(
            "Pulse width {} windows (min {}, cap {}), margin {:.1}dB, floor {:.1}dB, baseline {:?}",
            pf_size,
            min_windows,
            max_excluded,
            params.margin_db,
            params.min_pulse_power_db,
            params.baseline_policy,
        );

        Ok(Self {
            params: *params,
            layout,
            bins,
            pf_size,
            min_windows,
            windower,
            engine,
            finders,
            aggregator,
            next_window: 0,
            started: false,
            frame: vec![0.0; CHANNELS],
        })
    }

    pub fn first_freq_bin(&self) -> usize {
        *self.bins.start()
    }

    pub fn last_freq_bin(&self) -> usize {
        *self.bins.end()
    }

    pub fn pf_size(&self) -> usize {
        self.pf_size
    }

    pub fn min_pulse_windows(&self) -> usize {
        self.min_windows
    }

    pub fn hop(&self) -> usize {
        self.params.hop()
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        self.aggregator.bin_frequency(bin)
    }

    /// Feed one block. `timestamp` is the stream time (s) of the block's
    /// first sample; the first block after initialise or reset sets the
    /// origin that window times are measured from.
    pub fn process(
        &mut self,
        input: &[&[f32]],
        timestamp: f64,
    ) -> Result<FeatureSet, DetectorError> {
        if input.len() != CHANNELS {
            return Err(DetectorError::Input(format!(
                "expected {} channels, got {}",
                CHANNELS,
                input.len()
            )));
        }
        let len = input[0].len();
        if input.iter().any(|channel| channel.len() != len) || len > self.layout.block_size {
            return Err(DetectorError::Input(format!(
                "channels must hold the same number of samples, at most {}",
                self.layout.block_size
            )));
        }
        if !self.started {
            self.aggregator.set_origin(timestamp);
            self.started = true;
        }

        for i in 0..len.min(self.layout.step_size) {
            for (slot, channel) in self.frame.iter_mut().zip(input) {
                *slot = channel[i];
            }
            if let Some(phase) = self.windower.push(&self.frame) {
                self.analyse_window(phase)?;
            }
        }
        Ok(self.aggregator.finish())
    }

    fn analyse_window(&mut self, phase: usize) -> Result<(), DetectorError> {
        let window = self.next_window;
        self.next_window += 1;
        let first = *self.bins.start();
        for channel in 0..CHANNELS {
            let power = self.engine.transform(self.windower.window(channel, phase), phase)?;
            let finders = self.finders[channel].iter_mut();
            for (offset, (finder, &p)) in finders.zip(power).enumerate() {
                if let Some(pulse) = finder.push(window, p) {
                    log::debug!(
                        "Pulse ch{} bin {} at window {}: {} windows",
                        channel,
                        first + offset,
                        pulse.onset_window,
                        pulse.windows
                    );
                    self.aggregator.collect(channel, first + offset, pulse);
                }
            }
        }
        Ok(())
    }

    /// Close the stream: every bin still inside a pulse reports it. Samples
    /// waiting in partial windows are not transformed.
    pub fn remaining_features(&mut self) -> Result<FeatureSet, DetectorError> {
        let first = *self.bins.start();
        for (channel, finders) in self.finders.iter_mut().enumerate() {
            for (offset, finder) in finders.iter_mut().enumerate() {
                if let Some(pulse) = finder.flush() {
                    log::debug!(
                        "Pulse ch{} bin {} truncated at stream end after {} windows",
                        channel,
                        first + offset,
                        pulse.windows
                    );
                    self.aggregator.collect(channel, first + offset, pulse);
                }
            }
        }
        Ok(self.aggregator.finish())
    }

    /// Rewind to an empty stream. Buffers and FFT plans are kept.
    pub fn reset(&mut self) {
        self.windower.reset();
        for finder in self.finders.iter_mut().flatten() {
            finder.reset();
        }
        self.aggregator.reset();
        self.next_window = 0;
        self.started = false;
    }
}
