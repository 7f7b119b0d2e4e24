use thiserror::Error;

/// Rejected detector configuration. Reported by
/// [`PulseDetector::initialise`](super::PulseDetector::initialise) before any
/// streaming starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sample rate must be greater than zero, got {0}")]
    InvalidSampleRate(f32),
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    UnsupportedChannelCount { expected: usize, actual: usize },
    #[error("invalid block layout: step size {step_size} must be in 1..={block_size}")]
    InvalidBlockLayout { step_size: usize, block_size: usize },
    #[error("fft window size must be even and at least 4, got {0}")]
    InvalidWindowSize(usize),
    #[error("fft window size {window} exceeds block size {block}")]
    WindowTooLarge { window: usize, block: usize },
    #[error("frequency range {min_hz}..{max_hz} Hz must satisfy 0 < min < max < {nyquist_hz} Hz")]
    InvalidFrequencyRange {
        min_hz: f32,
        max_hz: f32,
        nyquist_hz: f32,
    },
    #[error("no bin centre lies in {min_hz}..{max_hz} Hz (bin width {bin_hz} Hz)")]
    EmptyBand { min_hz: f32, max_hz: f32, bin_hz: f32 },
    #[error("detection margin must be positive, got {0} dB")]
    InvalidMargin(f32),
    #[error("parameter '{id}' = {value} is outside {min}..={max}")]
    ParameterOutOfRange {
        id: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),
    #[error("parameter '{id}' is not a number: {value}")]
    NotANumber { id: String, value: f32 },
}

/// Everything that can stop a detector.
///
/// `Transform` is fatal for the instance: the detector cannot produce power
/// spectra without a working FFT. `Config` means the collaborator may retry
/// with adjusted parameters.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transform failed for phase {phase}: {reason}")]
    Transform { phase: usize, reason: String },
    #[error("input mismatch: {0}")]
    Input(String),
}
