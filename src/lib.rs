pub mod config;
pub mod error;
pub mod generator;
pub mod instrument;
pub mod protocol;
pub mod types;

pub use crate::config::{AppConfig, load_config, load_config_or_default, load_config_with_fallback};
pub use error::SigGenError;
pub use generator::{DriverConfig, KNOWN_MODELS, SignalGenerator, SignalGeneratorBuilder};
pub use instrument::{
    InstrumentSession, Resource, SessionConfig, SimProfile, SimulatedInstrument, TcpTransport,
    Transport,
};
#[cfg(feature = "visa")]
pub use instrument::VisaTransport;
pub use types::{
    DeviceError, Identity, IntoParam, OutputState, SweepConfig, SweepMode, SweepType, Unit,
};
