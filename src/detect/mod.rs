pub mod aggregate;
pub mod controller;
pub mod error;
pub mod finder;
pub mod params;
pub mod spectrum;
pub mod window;

pub use aggregate::{FeatureSet, PulseAggregator, PulseFeature};
pub use controller::{PulseDetector, StreamLayout};
pub use error::{ConfigError, DetectorError, ParamError};
pub use finder::{BinPulse, BinPulseFinder};
pub use params::{BaselinePolicy, DetectorParams, ParameterDescriptor, DEFAULT_PARAMS, PARAMETERS};
pub use spectrum::SpectralPowerEngine;
pub use window::Windower;
