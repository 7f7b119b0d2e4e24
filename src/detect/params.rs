use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ParamError};

/// Powers at or below this are reported as [`POWER_FLOOR_DB`].
const MIN_REPORTED_POWER: f32 = 1e-20;
pub const POWER_FLOOR_DB: f32 = -200.0;

/// Slack when a band edge lands exactly on a bin centre.
const BIN_EPSILON: f64 = 1e-9;

/// Whether samples that are above threshold feed the baseline of their bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BaselinePolicy {
    /// Above-threshold samples are kept out of the moving average, so a
    /// pulse never raises its own rejection threshold.
    #[default]
    Exclude,
    /// Every sample enters the moving average.
    Include,
}

impl BaselinePolicy {
    fn as_value(self) -> f32 {
        match self {
            BaselinePolicy::Exclude => 0.0,
            BaselinePolicy::Include => 1.0,
        }
    }

    fn from_value(value: f32) -> Self {
        if value >= 0.5 {
            BaselinePolicy::Include
        } else {
            BaselinePolicy::Exclude
        }
    }
}

/// Detector parameters. Fixed once a detector is initialised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Expected pulse width (ms).
    pub plen_ms: f32,
    /// Absolute power floor a pulse must reach (dB, engine power units).
    pub min_pulse_power_db: f32,
    /// Required excess over the bin's moving-average baseline (dB).
    pub margin_db: f32,
    /// Samples per FFT window.
    pub fft_win_size: usize,
    /// Lowest monitored bin centre (Hz).
    pub min_freq_hz: f32,
    /// Highest monitored bin centre (Hz).
    pub max_freq_hz: f32,
    /// Run a second window phase offset by half a window.
    pub overlap: bool,
    pub baseline_policy: BaselinePolicy,
}

pub const DEFAULT_PARAMS: DetectorParams = DetectorParams {
    plen_ms: 2.5,
    min_pulse_power_db: -60.0,
    margin_db: 5.0,
    fft_win_size: 24,
    min_freq_hz: 2000.0,
    max_freq_hz: 22000.0,
    overlap: true,
    baseline_policy: BaselinePolicy::Exclude,
};

impl Default for DetectorParams {
    fn default() -> Self {
        DEFAULT_PARAMS
    }
}

/// A named, independently settable parameter with its legal range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDescriptor {
    pub id: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub quantize_step: Option<f32>,
}

impl ParameterDescriptor {
    /// Clamp into range and snap to the quantize step.
    pub fn constrain(&self, value: f32) -> f32 {
        let clamped = value.clamp(self.min, self.max);
        match self.quantize_step {
            Some(step) => ((clamped / step).round() * step).clamp(self.min, self.max),
            None => clamped,
        }
    }
}

pub const PARAMETERS: &[ParameterDescriptor] = &[
    ParameterDescriptor {
        id: "plen",
        description: "Width of the pulse to detect",
        unit: "ms",
        min: 0.1,
        max: 1000.0,
        default: DEFAULT_PARAMS.plen_ms,
        quantize_step: None,
    },
    ParameterDescriptor {
        id: "minPulsePowerDB",
        description: "Minimum power a pulse must reach",
        unit: "dB",
        min: -200.0,
        max: 0.0,
        default: DEFAULT_PARAMS.min_pulse_power_db,
        quantize_step: None,
    },
    ParameterDescriptor {
        id: "fftWinSize",
        description: "Samples per FFT window",
        unit: "samples",
        min: 4.0,
        max: 65536.0,
        default: DEFAULT_PARAMS.fft_win_size as f32,
        quantize_step: Some(2.0),
    },
    ParameterDescriptor {
        id: "minFreq",
        description: "Lowest monitored bin centre frequency",
        unit: "Hz",
        min: 0.0,
        max: 192000.0,
        default: DEFAULT_PARAMS.min_freq_hz,
        quantize_step: None,
    },
    ParameterDescriptor {
        id: "maxFreq",
        description: "Highest monitored bin centre frequency",
        unit: "Hz",
        min: 0.0,
        max: 192000.0,
        default: DEFAULT_PARAMS.max_freq_hz,
        quantize_step: None,
    },
    ParameterDescriptor {
        id: "marginDB",
        description: "Required excess of pulse power over the bin baseline",
        unit: "dB",
        min: 0.1,
        max: 60.0,
        default: DEFAULT_PARAMS.margin_db,
        quantize_step: None,
    },
    ParameterDescriptor {
        id: "overlap",
        description: "Use 50% overlapped windows",
        unit: "",
        min: 0.0,
        max: 1.0,
        default: 1.0,
        quantize_step: Some(1.0),
    },
    ParameterDescriptor {
        id: "baselinePolicy",
        description: "0 = exclude pulse samples from the baseline, 1 = include them",
        unit: "",
        min: 0.0,
        max: 1.0,
        default: 0.0,
        quantize_step: Some(1.0),
    },
];

pub fn descriptor(id: &str) -> Option<&'static ParameterDescriptor> {
    PARAMETERS.iter().find(|d| d.id == id)
}

impl DetectorParams {
    pub fn parameter(&self, id: &str) -> Result<f32, ParamError> {
        let value = match id {
            "plen" => self.plen_ms,
            "minPulsePowerDB" => self.min_pulse_power_db,
            "fftWinSize" => self.fft_win_size as f32,
            "minFreq" => self.min_freq_hz,
            "maxFreq" => self.max_freq_hz,
            "marginDB" => self.margin_db,
            "overlap" => {
                if self.overlap {
                    1.0
                } else {
                    0.0
                }
            }
            "baselinePolicy" => self.baseline_policy.as_value(),
            _ => return Err(ParamError::Unknown(id.to_string())),
        };
        Ok(value)
    }

    /// Set a parameter by id. Out-of-range values are clamped to the legal
    /// range; returns the value actually stored.
    pub fn set_parameter(&mut self, id: &str, value: f32) -> Result<f32, ParamError> {
        let desc = descriptor(id).ok_or_else(|| ParamError::Unknown(id.to_string()))?;
        if value.is_nan() {
            return Err(ParamError::NotANumber {
                id: id.to_string(),
                value,
            });
        }
        let stored = desc.constrain(value);
        if stored != value {
            log::warn!("Parameter {} = {} adjusted to {}", id, value, stored);
        }
        match id {
            "plen" => self.plen_ms = stored,
            "minPulsePowerDB" => self.min_pulse_power_db = stored,
            "fftWinSize" => self.fft_win_size = stored as usize,
            "minFreq" => self.min_freq_hz = stored,
            "maxFreq" => self.max_freq_hz = stored,
            "marginDB" => self.margin_db = stored,
            "overlap" => self.overlap = stored >= 0.5,
            "baselinePolicy" => self.baseline_policy = BaselinePolicy::from_value(stored),
            _ => return Err(ParamError::Unknown(id.to_string())),
        }
        Ok(stored)
    }

    /// Run every field through the same clamping as [`set_parameter`](Self::set_parameter).
    /// NaN fields fall back to their defaults.
    pub fn clamped(mut self) -> Self {
        for desc in PARAMETERS {
            let current = self.parameter(desc.id).unwrap_or(desc.default);
            if self.set_parameter(desc.id, current).is_err() {
                log::warn!("Parameter {} is not a number, using default {}", desc.id, desc.default);
                let _ = self.set_parameter(desc.id, desc.default);
            }
        }
        self
    }

    pub fn hop(&self) -> usize {
        hop_size(self.fft_win_size, self.overlap)
    }

    pub fn phases(&self) -> usize {
        if self.overlap {
            2
        } else {
            1
        }
    }

    /// Check cross-parameter consistency for a stream at `sample_rate` and
    /// return the monitored bin range.
    pub fn validate(&self, sample_rate: f32) -> Result<RangeInclusive<usize>, ConfigError> {
        if !(sample_rate > 0.0 && sample_rate.is_finite()) {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }
        if self.fft_win_size < 4 || self.fft_win_size % 2 != 0 {
            return Err(ConfigError::InvalidWindowSize(self.fft_win_size));
        }
        if !(self.margin_db > 0.0) {
            return Err(ConfigError::InvalidMargin(self.margin_db));
        }
        let nyquist_hz = sample_rate / 2.0;
        if !(self.min_freq_hz > 0.0
            && self.min_freq_hz < self.max_freq_hz
            && self.max_freq_hz < nyquist_hz)
        {
            return Err(ConfigError::InvalidFrequencyRange {
                min_hz: self.min_freq_hz,
                max_hz: self.max_freq_hz,
                nyquist_hz,
            });
        }
        // Fields are public, so values that never went through set_parameter
        // are checked against the descriptor ranges here.
        for desc in PARAMETERS {
            let value = self.parameter(desc.id).unwrap_or(f32::NAN);
            if !(value >= desc.min && value <= desc.max) {
                return Err(ConfigError::ParameterOutOfRange {
                    id: desc.id,
                    value,
                    min: desc.min,
                    max: desc.max,
                });
            }
        }
        bin_range(sample_rate, self.fft_win_size, self.min_freq_hz, self.max_freq_hz)
    }
}

pub fn hop_size(fft_win_size: usize, overlap: bool) -> usize {
    if overlap {
        fft_win_size / 2
    } else {
        fft_win_size
    }
}

/// Expected pulse width in produced windows, at least 1. Doubles as the
/// baseline span of every bin detector.
pub fn pulse_windows(plen_ms: f32, sample_rate: f32, hop: usize) -> usize {
    let plen_samples = plen_ms as f64 * sample_rate as f64 / 1000.0;
    let windows = (plen_samples / hop as f64).round();
    if windows < 1.0 {
        1
    } else {
        windows as usize
    }
}

/// Shortest run of above-threshold windows accepted as a pulse. Single
/// window excursions are always noise.
pub fn min_pulse_windows(pf_size: usize) -> usize {
    pf_size.div_ceil(2).max(2)
}

/// Longest run kept out of the baseline under [`BaselinePolicy::Exclude`].
/// A level held for more than four expected pulse widths is treated as a
/// new floor: later windows of the run enter the baseline and the run ends
/// once the baseline has caught up.
pub fn max_excluded_windows(pf_size: usize) -> usize {
    (4 * pf_size).max(min_pulse_windows(pf_size))
}

/// Bins whose centre frequency lies in `[min_hz, max_hz]`, both ends inclusive.
pub fn bin_range(
    sample_rate: f32,
    fft_win_size: usize,
    min_hz: f32,
    max_hz: f32,
) -> Result<RangeInclusive<usize>, ConfigError> {
    let bin_hz = sample_rate as f64 / fft_win_size as f64;
    let first = (min_hz as f64 / bin_hz - BIN_EPSILON).ceil().max(1.0) as usize;
    let last = ((max_hz as f64 / bin_hz + BIN_EPSILON).floor() as usize).min(fft_win_size / 2);
    if first > last {
        return Err(ConfigError::EmptyBand {
            min_hz,
            max_hz,
            bin_hz: bin_hz as f32,
        });
    }
    Ok(first..=last)
}

pub fn db_to_power(db: f32) -> f32 {
    10f32.powf(db / 10.0)
}

pub fn power_to_db(power: f32) -> f32 {
    if power > MIN_REPORTED_POWER {
        10.0 * power.log10()
    } else {
        POWER_FLOOR_DB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_at_common_rates() {
        for rate in [44100.0, 48000.0, 96000.0] {
            assert!(DEFAULT_PARAMS.validate(rate).is_ok(), "rate {rate}");
        }
        assert_eq!(DetectorParams::default(), DEFAULT_PARAMS);
    }

    #[test]
    fn descriptor_defaults_match_params() {
        for desc in PARAMETERS {
            assert_eq!(DEFAULT_PARAMS.parameter(desc.id).unwrap(), desc.default, "{}", desc.id);
        }
    }

    #[test]
    fn bin_range_includes_both_edges() {
        // 48 kHz / 64 = 750 Hz per bin
        let range = bin_range(48000.0, 64, 1500.0, 6000.0).unwrap();
        assert_eq!(range, 2..=8);
    }

    #[test]
    fn bin_range_excludes_centres_outside_band() {
        let range = bin_range(48000.0, 64, 1501.0, 5999.0).unwrap();
        assert_eq!(range, 3..=7);
        for bin in range {
            let hz = bin as f32 * 750.0;
            assert!((1501.0..=5999.0).contains(&hz));
        }
    }

    #[test]
    fn band_narrower_than_a_bin_is_rejected() {
        let err = bin_range(48000.0, 64, 1600.0, 2000.0).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyBand { .. }));
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        let mut params = DEFAULT_PARAMS;
        params.min_freq_hz = 5000.0;
        params.max_freq_hz = 4000.0;
        assert!(matches!(params.validate(48000.0), Err(ConfigError::InvalidFrequencyRange { .. })));

        let mut params = DEFAULT_PARAMS;
        params.max_freq_hz = 24000.0;
        assert!(matches!(params.validate(48000.0), Err(ConfigError::InvalidFrequencyRange { .. })));

        let mut params = DEFAULT_PARAMS;
        params.fft_win_size = 25;
        assert_eq!(params.validate(48000.0), Err(ConfigError::InvalidWindowSize(25)));

        assert_eq!(DEFAULT_PARAMS.validate(0.0), Err(ConfigError::InvalidSampleRate(0.0)));
    }

    #[test]
    fn validate_rejects_fields_outside_descriptor_ranges() {
        let mut params = DEFAULT_PARAMS;
        params.plen_ms = 1e30;
        assert!(matches!(
            params.validate(48000.0),
            Err(ConfigError::ParameterOutOfRange { id: "plen", .. })
        ));

        let mut params = DEFAULT_PARAMS;
        params.plen_ms = f32::NAN;
        assert!(matches!(
            params.validate(48000.0),
            Err(ConfigError::ParameterOutOfRange { id: "plen", .. })
        ));

        let mut params = DEFAULT_PARAMS;
        params.min_pulse_power_db = f32::NAN;
        assert!(matches!(
            params.validate(48000.0),
            Err(ConfigError::ParameterOutOfRange { id: "minPulsePowerDB", .. })
        ));

        let mut params = DEFAULT_PARAMS;
        params.min_pulse_power_db = 10.0;
        assert!(matches!(
            params.validate(48000.0),
            Err(ConfigError::ParameterOutOfRange { id: "minPulsePowerDB", .. })
        ));

        let mut params = DEFAULT_PARAMS;
        params.margin_db = 0.0;
        assert_eq!(params.validate(48000.0), Err(ConfigError::InvalidMargin(0.0)));

        assert!(matches!(
            DEFAULT_PARAMS.validate(f32::INFINITY),
            Err(ConfigError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn pulse_windows_rounds_to_hops() {
        // 2.5 ms at 48 kHz = 120 samples
        assert_eq!(pulse_windows(2.5, 48000.0, 32), 4);
        assert_eq!(pulse_windows(2.5, 48000.0, 64), 2);
        assert_eq!(pulse_windows(2.5, 48000.0, 12), 10);
        assert_eq!(pulse_windows(0.1, 48000.0, 1024), 1);
    }

    #[test]
    fn min_pulse_windows_never_accepts_single_window() {
        assert_eq!(min_pulse_windows(1), 2);
        assert_eq!(min_pulse_windows(2), 2);
        assert_eq!(min_pulse_windows(4), 2);
        assert_eq!(min_pulse_windows(5), 3);
        assert_eq!(min_pulse_windows(10), 5);
    }

    #[test]
    fn exclusion_cap_outlasts_expected_pulses() {
        assert_eq!(max_excluded_windows(1), 4);
        assert_eq!(max_excluded_windows(4), 16);
        for pf in 1..50 {
            assert!(max_excluded_windows(pf) > pf);
            assert!(max_excluded_windows(pf) >= min_pulse_windows(pf));
        }
    }

    #[test]
    fn set_parameter_clamps_and_quantizes() {
        let mut params = DEFAULT_PARAMS;
        assert_eq!(params.set_parameter("fftWinSize", 33.0).unwrap(), 34.0);
        assert_eq!(params.fft_win_size, 34);
        assert_eq!(params.set_parameter("fftWinSize", 1.0).unwrap(), 4.0);
        assert_eq!(params.set_parameter("marginDB", -3.0).unwrap(), 0.1);
        assert_eq!(params.set_parameter("plen", 5000.0).unwrap(), 1000.0);
        params.set_parameter("overlap", 0.0).unwrap();
        assert!(!params.overlap);
        params.set_parameter("baselinePolicy", 1.0).unwrap();
        assert_eq!(params.baseline_policy, BaselinePolicy::Include);
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut params = DEFAULT_PARAMS;
        assert_eq!(params.set_parameter("gain", 1.0), Err(ParamError::Unknown("gain".into())));
        assert!(params.parameter("gain").is_err());
        assert!(matches!(
            params.set_parameter("plen", f32::NAN),
            Err(ParamError::NotANumber { .. })
        ));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let params: DetectorParams =
            toml::from_str("plen_ms = 20.0\nbaseline_policy = \"include\"").unwrap();
        assert_eq!(params.plen_ms, 20.0);
        assert_eq!(params.baseline_policy, BaselinePolicy::Include);
        assert_eq!(params.fft_win_size, DEFAULT_PARAMS.fft_win_size);
    }

    #[test]
    fn clamped_repairs_out_of_range_fields() {
        let mut params = DEFAULT_PARAMS;
        params.fft_win_size = 3;
        params.plen_ms = f32::NAN;
        let params = params.clamped();
        assert_eq!(params.fft_win_size, 4);
        assert_eq!(params.plen_ms, DEFAULT_PARAMS.plen_ms);
    }

    #[test]
    fn db_conversions() {
        assert!((db_to_power(10.0) - 10.0).abs() < 1e-4);
        assert!((power_to_db(0.01) + 20.0).abs() < 1e-4);
        assert_eq!(power_to_db(0.0), POWER_FLOOR_DB);
    }
}
