//! Frequency-domain pulse detection for two-channel radio-tag recordings.
//!
//! The detector is driven block by block through [`detect::PulseDetector`];
//! the `pulsefind` binary wraps it with audio decoding and CSV/JSON output.

pub mod audio;
pub mod detect;
