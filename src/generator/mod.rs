use crate::error::SigGenError;
use crate::instrument::{InstrumentSession, SessionConfig, Transport};
use crate::types::{DeviceError, Identity};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod frequency;
pub mod output;
pub mod power;
pub mod status;
pub mod sweep;

/// Models the driver has been used with.
///
/// `siggen.example.toml` lists the same models under `driver.known_models`.
pub const KNOWN_MODELS: [&str; 4] = ["SMF100A", "SMT03", "SMIQ06L", "SMA100A"];

/// Behavior of the driver on top of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Follow every mutating command with `*OPC?` and an error queue drain
    pub confirm_commands: bool,
    /// Upper bound on `SYST:ERR?` reads per drain
    pub max_error_drain: usize,
    /// Models accepted without an identification warning
    pub known_models: Vec<String>,
    /// Device errors kept for [`SignalGenerator::device_errors`]; the oldest
    /// are dropped beyond this
    pub max_recorded_errors: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            confirm_commands: true,
            max_error_drain: 32,
            known_models: KNOWN_MODELS.iter().map(|m| m.to_string()).collect(),
            max_recorded_errors: 256,
        }
    }
}

/// Builder for [`SignalGenerator`] instances that open their own session.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use rf_siggen::SignalGenerator;
///
/// let generator = SignalGenerator::builder()
///     .resource("TCPIP0::192.168.1.40::5025::SOCKET")
///     .timeout(Duration::from_secs(2))
///     .confirm_commands(true)
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct SignalGeneratorBuilder {
    resource: Option<String>,
    session: SessionConfig,
    driver: DriverConfig,
}

impl SignalGeneratorBuilder {
    pub fn resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    /// Talk to a simulated instrument described by the profile at `path`
    pub fn simulation<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.session.simulation = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.session.timeout = timeout;
        self
    }

    pub fn confirm_commands(mut self, confirm: bool) -> Self {
        self.driver.confirm_commands = confirm;
        self
    }

    pub fn max_error_drain(mut self, max: usize) -> Self {
        self.driver.max_error_drain = max;
        self
    }

    pub fn known_models(mut self, models: Vec<String>) -> Self {
        self.driver.known_models = models;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    pub fn driver_config(mut self, config: DriverConfig) -> Self {
        self.driver = config;
        self
    }

    /// Open the session and identify the instrument.
    pub fn build(self) -> Result<SignalGenerator, SigGenError> {
        let resource = self
            .resource
            .or_else(|| self.session.simulation.as_ref().map(|_| "SIM".to_string()))
            .ok_or_else(|| SigGenError::InvalidAddress("Resource must be specified".to_string()))?;

        let session = InstrumentSession::open(&resource, &self.session)?;
        SignalGenerator::connect(session, self.driver)
    }
}

/// Driver for an SCPI RF signal generator.
///
/// Every setter validates its arguments before anything is written, so a
/// rejected parameter never reaches the device. With
/// [`DriverConfig::confirm_commands`] set, each mutating command waits for
/// `*OPC?` and drains the error queue; errors the device reports there are
/// logged and collected in [`device_errors`](Self::device_errors) rather than
/// returned as failures.
///
/// # Examples
///
/// ```no_run
/// use rf_siggen::{SignalGenerator, Unit};
///
/// let mut generator = SignalGenerator::builder()
///     .resource("TCPIP0::192.168.1.40::5025::SOCKET")
///     .build()?;
///
/// generator.set_center_frequency(2400, Unit::MHz)?;
/// generator.set_output_power(-20.0)?;
/// generator.set_output_state(true)?;
///
/// for error in generator.take_device_errors() {
///     eprintln!("device reported: {error}");
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SignalGenerator<T: Transport = Box<dyn Transport>> {
    session: InstrumentSession<T>,
    config: DriverConfig,
    identity: Option<Identity>,
    device_errors: Vec<DeviceError>,
}

impl SignalGenerator {
    pub fn builder() -> SignalGeneratorBuilder {
        SignalGeneratorBuilder::default()
    }
}

impl<T: Transport> SignalGenerator<T> {
    /// Wrap an open session and identify the connected instrument.
    ///
    /// An unknown model only produces a warning.
    pub fn connect(session: InstrumentSession<T>, config: DriverConfig) -> Result<Self, SigGenError> {
        let mut generator = Self {
            session,
            config,
            identity: None,
            device_errors: Vec::new(),
        };
        generator.identify()?;
        Ok(generator)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn set_confirm_commands(&mut self, confirm: bool) {
        self.config.confirm_commands = confirm;
    }

    pub fn session(&self) -> &InstrumentSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut InstrumentSession<T> {
        &mut self.session
    }

    /// Device errors collected while confirming commands, oldest first.
    ///
    /// At most [`DriverConfig::max_recorded_errors`] are kept.
    pub fn device_errors(&self) -> &[DeviceError] {
        &self.device_errors
    }

    pub fn take_device_errors(&mut self) -> Vec<DeviceError> {
        std::mem::take(&mut self.device_errors)
    }

    pub fn close(&mut self) -> Result<(), SigGenError> {
        self.session.close()
    }

    /// Write a mutating command and, if enabled, confirm it.
    pub(crate) fn send(&mut self, command: &str) -> Result<(), SigGenError> {
        self.session.write(command)?;
        if self.config.confirm_commands {
            self.confirm(command)?;
        }
        Ok(())
    }

    fn confirm(&mut self, command: &str) -> Result<(), SigGenError> {
        self.wait_complete()?;
        let errors = self.drain_errors(Some(command))?;
        if errors.is_empty() {
            debug!("{command:?} confirmed");
        }
        for error in &errors {
            warn!("Device error after {command:?}: {error}");
        }
        self.record(errors);
        Ok(())
    }

    fn record(&mut self, errors: Vec<DeviceError>) {
        self.device_errors.extend(errors);
        let excess = self
            .device_errors
            .len()
            .saturating_sub(self.config.max_recorded_errors);
        if excess > 0 {
            debug!("Dropping {excess} oldest recorded device errors");
            self.device_errors.drain(..excess);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::instrument::SimulatedInstrument;

    pub fn simulated() -> SignalGenerator<SimulatedInstrument> {
        let session = InstrumentSession::new(SimulatedInstrument::default(), "SIM");
        SignalGenerator::connect(session, DriverConfig::default()).unwrap()
    }

    /// Commands received by the simulator after the initial identification.
    pub fn sent_after_connect(generator: &SignalGenerator<SimulatedInstrument>) -> Vec<String> {
        generator.session().transport().history()[1..].to_vec()
    }

    /// Commands received, leaving out the confirmation traffic.
    pub fn settings_sent(generator: &SignalGenerator<SimulatedInstrument>) -> Vec<String> {
        sent_after_connect(generator)
            .into_iter()
            .filter(|c| c != "*OPC?" && c != "SYST:ERR?")
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::instrument::SimulatedInstrument;
    use crate::instrument::testing::ScriptedTransport;

    #[test]
    fn test_connect_identifies() {
        let generator = simulated();
        let identity = generator.identity().unwrap();
        assert_eq!(identity.model, "SMA100A");
        assert_eq!(generator.session().transport().history(), ["*IDN?"]);
    }

    #[test]
    fn test_unknown_model_is_advisory() {
        let transport = ScriptedTransport::with_replies(&["Keysight,N5183B,MY1234,B.01"]);
        let session = InstrumentSession::new(transport, "scripted");
        let generator = SignalGenerator::connect(session, DriverConfig::default()).unwrap();
        assert_eq!(generator.identity().unwrap().model, "N5183B");
    }

    #[test]
    fn test_confirmation_follows_mutating_commands() {
        let mut generator = simulated();
        generator.set_output_power(-12.0).unwrap();
        assert_eq!(
            sent_after_connect(&generator),
            ["POW:LEV -12", "*OPC?", "SYST:ERR?"]
        );
        assert!(generator.device_errors().is_empty());
    }

    #[test]
    fn test_confirmation_can_be_disabled() {
        let mut generator = simulated();
        generator.set_confirm_commands(false);
        generator.set_output_power(-12.0).unwrap();
        assert_eq!(sent_after_connect(&generator), ["POW:LEV -12"]);
    }

    #[test]
    fn test_device_errors_are_collected_not_raised() {
        let mut generator = simulated();
        // out of the simulated 18 dBm limit
        generator.set_output_power(30.0).unwrap();

        let errors = generator.device_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, Some(-222));
        assert_eq!(errors[0].command.as_deref(), Some("POW:LEV 30"));

        let taken = generator.take_device_errors();
        assert_eq!(taken.len(), 1);
        assert!(generator.device_errors().is_empty());
    }

    #[test]
    fn test_recorded_errors_are_capped() {
        let session = InstrumentSession::new(SimulatedInstrument::default(), "SIM");
        let config = DriverConfig {
            max_recorded_errors: 2,
            ..DriverConfig::default()
        };
        let mut generator = SignalGenerator::connect(session, config).unwrap();
        for power in [30.0, 31.0, 32.0] {
            generator.set_output_power(power).unwrap();
        }

        let commands: Vec<_> = generator
            .device_errors()
            .iter()
            .map(|e| e.command.as_deref())
            .collect();
        assert_eq!(commands, [Some("POW:LEV 31"), Some("POW:LEV 32")]);
    }

    #[test]
    fn test_builder_requires_resource() {
        let result = SignalGenerator::builder().build();
        assert!(matches!(result, Err(SigGenError::InvalidAddress(_))));
    }

    #[test]
    fn test_close_releases_session() {
        let mut generator = simulated();
        generator.close().unwrap();
        assert!(generator.session().is_closed());
        assert!(matches!(
            generator.get_output_power(),
            Err(SigGenError::SessionClosed)
        ));
    }
}
