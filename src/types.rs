use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SigGenError;

/// Conversion of caller input into a validated parameter.
///
/// Lets driver methods accept either the typed value or its textual token,
/// e.g. `Unit::MHz` and `"mhz"`, with the token checked at the boundary.
pub trait IntoParam<T> {
    fn into_param(self) -> Result<T, SigGenError>;
}

macro_rules! token_param {
    ($ty:ty) => {
        impl IntoParam<$ty> for $ty {
            fn into_param(self) -> Result<$ty, SigGenError> {
                Ok(self)
            }
        }

        impl IntoParam<$ty> for &str {
            fn into_param(self) -> Result<$ty, SigGenError> {
                self.parse()
            }
        }

        impl IntoParam<$ty> for String {
            fn into_param(self) -> Result<$ty, SigGenError> {
                self.parse()
            }
        }

        impl TryFrom<String> for $ty {
            type Error = SigGenError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> String {
                value.to_string()
            }
        }
    };
}

/// Frequency unit with its scale factor to Hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    Hz,
    KHz,
    MHz,
    GHz,
}

impl Unit {
    pub const ALL: [Unit; 4] = [Unit::Hz, Unit::KHz, Unit::MHz, Unit::GHz];

    pub fn scale(self) -> f64 {
        match self {
            Unit::Hz => 1.0,
            Unit::KHz => 1e3,
            Unit::MHz => 1e6,
            Unit::GHz => 1e9,
        }
    }

    pub fn to_hz(self, value: f64) -> f64 {
        value * self.scale()
    }

    pub fn from_hz(self, hz: f64) -> f64 {
        hz / self.scale()
    }
}

impl FromStr for Unit {
    type Err = SigGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hz" => Ok(Unit::Hz),
            "khz" => Ok(Unit::KHz),
            "mhz" => Ok(Unit::MHz),
            "ghz" => Ok(Unit::GHz),
            _ => Err(SigGenError::invalid("unit", s)),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Unit::Hz => "Hz",
            Unit::KHz => "kHz",
            Unit::MHz => "MHz",
            Unit::GHz => "GHz",
        };
        f.write_str(token)
    }
}

token_param!(Unit);

/// RF output state, `OUTP:STATE ON|OFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputState {
    On,
    Off,
}

impl OutputState {
    pub fn is_on(self) -> bool {
        self == OutputState::On
    }
}

impl From<bool> for OutputState {
    fn from(on: bool) -> Self {
        if on { OutputState::On } else { OutputState::Off }
    }
}

impl From<OutputState> for bool {
    fn from(state: OutputState) -> bool {
        state.is_on()
    }
}

impl IntoParam<OutputState> for bool {
    fn into_param(self) -> Result<OutputState, SigGenError> {
        Ok(self.into())
    }
}

impl FromStr for OutputState {
    type Err = SigGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ON" => Ok(OutputState::On),
            "OFF" => Ok(OutputState::Off),
            _ => Err(SigGenError::invalid("output state", s)),
        }
    }
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputState::On => "ON",
            OutputState::Off => "OFF",
        })
    }
}

token_param!(OutputState);

/// Frequency mode of the generator, `FREQ:MODE CW|SWEEP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SweepMode {
    Cw,
    Sweep,
}

impl SweepMode {
    /// Parse the mode as reported by `FREQ:MODE?`, which may use short forms.
    pub fn from_reply(reply: &str) -> Result<Self, SigGenError> {
        match reply.trim().to_ascii_uppercase().as_str() {
            "CW" | "FIX" | "FIXED" => Ok(SweepMode::Cw),
            "SWE" | "SWEEP" => Ok(SweepMode::Sweep),
            other => Err(SigGenError::Protocol(format!(
                "Unexpected frequency mode reply: {other:?}"
            ))),
        }
    }
}

impl FromStr for SweepMode {
    type Err = SigGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CW" => Ok(SweepMode::Cw),
            "SWEEP" => Ok(SweepMode::Sweep),
            _ => Err(SigGenError::invalid("sweep mode", s)),
        }
    }
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SweepMode::Cw => "CW",
            SweepMode::Sweep => "SWEEP",
        })
    }
}

token_param!(SweepMode);

/// Sweep trigger behavior, `SOUR:SWE:FREQ:MODE AUTO|SINGLE|STEP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SweepType {
    Auto,
    Single,
    Step,
}

impl FromStr for SweepType {
    type Err = SigGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(SweepType::Auto),
            "SINGLE" => Ok(SweepType::Single),
            "STEP" => Ok(SweepType::Step),
            _ => Err(SigGenError::invalid("sweep type", s)),
        }
    }
}

impl fmt::Display for SweepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SweepType::Auto => "AUTO",
            SweepType::Single => "SINGLE",
            SweepType::Step => "STEP",
        })
    }
}

token_param!(SweepType);

/// An entry taken from the instrument's error queue (`SYST:ERR?`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceError {
    /// SCPI error code, absent when the reply carried no leading integer
    pub code: Option<i32>,
    pub message: String,
    /// Command after which the error was drained, if known
    pub command: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code}: {}", self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        if let Some(command) = &self.command {
            write!(f, " (after {command:?})")?;
        }
        Ok(())
    }
}

/// Parsed `*IDN?` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub serial: Option<String>,
    pub firmware: Option<String>,
}

impl Identity {
    pub fn is_known(&self, known_models: &[String]) -> bool {
        known_models.iter().any(|m| m == &self.model)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.manufacturer, self.model)?;
        if let Some(serial) = &self.serial {
            write!(f, " (s/n {serial})")?;
        }
        if let Some(firmware) = &self.firmware {
            write!(f, " fw {firmware}")?;
        }
        Ok(())
    }
}

/// Parameters for [`SignalGenerator::setup_sweep`](crate::SignalGenerator::setup_sweep).
///
/// Frequencies and step size are given in `unit`; dwell time in milliseconds.
///
/// # Examples
///
/// ```
/// use rf_siggen::{SweepConfig, SweepType, Unit};
///
/// let sweep = SweepConfig::new(100.0, 200.0)
///     .unit(Unit::MHz)
///     .step(0.5)
///     .dwell_ms(10)
///     .sweep_type(SweepType::Single)
///     .execute(true);
/// assert_eq!(sweep.stop, 200.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub start: f64,
    pub stop: f64,
    pub unit: Unit,
    pub step: f64,
    pub dwell_ms: u32,
    pub sweep_type: SweepType,
    pub sweep_mode: SweepMode,
    /// Switch a generator found in CW mode to SWEEP and re-center it on `start`
    pub force_sweep_mode: bool,
    /// Start the sweep once configured
    pub execute: bool,
}

impl SweepConfig {
    pub fn new(start: f64, stop: f64) -> Self {
        Self {
            start,
            stop,
            ..Self::default()
        }
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn dwell_ms(mut self, dwell_ms: u32) -> Self {
        self.dwell_ms = dwell_ms;
        self
    }

    pub fn sweep_type(mut self, sweep_type: SweepType) -> Self {
        self.sweep_type = sweep_type;
        self
    }

    pub fn sweep_mode(mut self, sweep_mode: SweepMode) -> Self {
        self.sweep_mode = sweep_mode;
        self
    }

    pub fn force_sweep_mode(mut self, force: bool) -> Self {
        self.force_sweep_mode = force;
        self
    }

    pub fn execute(mut self, execute: bool) -> Self {
        self.execute = execute;
        self
    }

    /// Check every parameter; nothing is sent to the device if this fails.
    pub fn validate(&self) -> Result<(), SigGenError> {
        if !self.start.is_finite() || self.start <= 0.0 {
            return Err(SigGenError::invalid("start frequency", self.start));
        }
        if !self.stop.is_finite() || self.stop <= 0.0 {
            return Err(SigGenError::invalid("stop frequency", self.stop));
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(SigGenError::invalid("step size", self.step));
        }
        if self.sweep_mode != SweepMode::Sweep {
            return Err(SigGenError::invalid("sweep mode", self.sweep_mode));
        }
        Ok(())
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 0.0,
            unit: Unit::MHz,
            step: 0.1,
            dwell_ms: 5,
            sweep_type: SweepType::Auto,
            sweep_mode: SweepMode::Sweep,
            force_sweep_mode: true,
            execute: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_tokens_are_case_insensitive() {
        for token in ["mhz", "MHZ", "MHz", "mHz", " MHz "] {
            assert_eq!(token.parse::<Unit>().unwrap(), Unit::MHz, "{token}");
        }
        assert_eq!("KHZ".parse::<Unit>().unwrap(), Unit::KHz);
        assert_eq!("ghz".parse::<Unit>().unwrap(), Unit::GHz);
        assert_eq!("HZ".parse::<Unit>().unwrap(), Unit::Hz);
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let err = "THz".parse::<Unit>().unwrap_err();
        match err {
            SigGenError::InvalidValue { field, value } => {
                assert_eq!(field, "unit");
                assert_eq!(value, "THz");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unit_scale() {
        assert_eq!(Unit::GHz.to_hz(2.4), 2.4e9);
        assert_eq!(Unit::KHz.from_hz(1500.0), 1.5);
        assert_eq!(Unit::Hz.scale(), 1.0);
    }

    #[test]
    fn test_output_state_accepts_bool_and_token() {
        let from_bool: OutputState = true.into_param().unwrap();
        let from_token: OutputState = "ON".into_param().unwrap();
        assert_eq!(from_bool, from_token);
        assert_eq!(from_bool.to_string(), "ON");

        let off: OutputState = "off".into_param().unwrap();
        assert_eq!(off, OutputState::from(false));

        let err = IntoParam::<OutputState>::into_param("MAYBE").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_sweep_mode_reply_short_forms() {
        assert_eq!(SweepMode::from_reply("SWE\n").unwrap(), SweepMode::Sweep);
        assert_eq!(SweepMode::from_reply("CW").unwrap(), SweepMode::Cw);
        assert_eq!(SweepMode::from_reply("FIX").unwrap(), SweepMode::Cw);
        assert!(SweepMode::from_reply("LIST").is_err());
        assert!("SWE".parse::<SweepMode>().is_err());
    }

    #[test]
    fn test_sweep_type_tokens() {
        assert_eq!("single".parse::<SweepType>().unwrap(), SweepType::Single);
        assert!("RANDOM".parse::<SweepType>().is_err());
    }

    #[test]
    fn test_enums_serialize_as_tokens() {
        assert_eq!(serde_json::to_string(&Unit::KHz).unwrap(), "\"kHz\"");
        let unit: Unit = serde_json::from_str("\"ghz\"").unwrap();
        assert_eq!(unit, Unit::GHz);
        assert!(serde_json::from_str::<SweepType>("\"RANDOM\"").is_err());
    }

    #[test]
    fn test_sweep_config_validation() {
        assert!(SweepConfig::new(100.0, 200.0).validate().is_ok());
        assert!(SweepConfig::new(0.0, 200.0).validate().is_err());
        assert!(SweepConfig::new(100.0, f64::NAN).validate().is_err());
        assert!(SweepConfig::new(100.0, 200.0).step(0.0).validate().is_err());

        let err = SweepConfig::new(100.0, 200.0)
            .sweep_mode(SweepMode::Cw)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            SigGenError::InvalidValue { field: "sweep mode", .. }
        ));
    }

    #[test]
    fn test_identity_known_models() {
        let identity = Identity {
            manufacturer: "Rohde&Schwarz".to_string(),
            model: "SMA100A".to_string(),
            serial: None,
            firmware: None,
        };
        assert!(identity.is_known(&["SMF100A".to_string(), "SMA100A".to_string()]));
        assert!(!identity.is_known(&["SMT03".to_string()]));
    }
}
