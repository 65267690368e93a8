use super::Transport;
use crate::error::SigGenError;
use crate::protocol::{self, format_number};
use crate::types::{OutputState, SweepMode, SweepType};
use config::{Config, File};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

const UNDEFINED_HEADER: (i32, &str) = (-113, "Undefined header");
const DATA_TYPE_ERROR: (i32, &str) = (-104, "Data type error");
const DATA_OUT_OF_RANGE: (i32, &str) = (-222, "Data out of range");
const SETTINGS_CONFLICT: (i32, &str) = (-221, "Settings conflict");
const QUEUE_OVERFLOW: (i32, &str) = (-350, "Queue overflow");
const MAX_QUEUED_ERRORS: usize = 10;

/// Initial state and limits of a simulated generator.
///
/// Loaded from a TOML/JSON/YAML file; missing keys fall back to the defaults,
/// which describe an SMA100A.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimProfile {
    pub identity: String,
    pub frequency_hz: f64,
    pub power_dbm: f64,
    pub output_on: bool,
    pub mode: SweepMode,
    pub min_frequency_hz: f64,
    pub max_frequency_hz: f64,
    pub min_power_dbm: f64,
    pub max_power_dbm: f64,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            identity: "Rohde&Schwarz,SMA100A,1400.0000K02/100001,3.1.19.15".to_string(),
            frequency_hz: 1e9,
            power_dbm: -30.0,
            output_on: false,
            mode: SweepMode::Cw,
            min_frequency_hz: 9e3,
            max_frequency_hz: 6e9,
            min_power_dbm: -145.0,
            max_power_dbm: 18.0,
        }
    }
}

impl SimProfile {
    pub fn load(path: &Path) -> Result<Self, SigGenError> {
        if !path.exists() {
            return Err(SigGenError::Config(config::ConfigError::Message(format!(
                "Simulation profile not found: {}",
                path.display()
            ))));
        }
        let profile = Config::builder()
            .add_source(Config::try_from(&SimProfile::default())?)
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SimProfile>()?;
        Ok(profile)
    }
}

/// Sweep settings held by the simulator, in Hz and milliseconds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimSweep {
    pub start_hz: f64,
    pub stop_hz: f64,
    pub step_hz: f64,
    pub dwell_ms: f64,
    pub linear: bool,
    pub trigger: String,
    pub sweep_type: Option<SweepType>,
    pub running: bool,
}

/// In-process SCPI signal generator.
///
/// Interprets the command set of the driver, keeps an error queue like the
/// real device and records every message it receives.
#[derive(Debug, Clone)]
pub struct SimulatedInstrument {
    profile: SimProfile,
    frequency_hz: f64,
    power_dbm: f64,
    output_on: bool,
    mode: SweepMode,
    sweep: SimSweep,
    errors: VecDeque<(i32, String)>,
    replies: VecDeque<String>,
    history: Vec<String>,
}

impl Default for SimulatedInstrument {
    fn default() -> Self {
        Self::new(SimProfile::default())
    }
}

impl SimulatedInstrument {
    pub fn new(profile: SimProfile) -> Self {
        Self {
            frequency_hz: profile.frequency_hz,
            power_dbm: profile.power_dbm,
            output_on: profile.output_on,
            mode: profile.mode,
            sweep: SimSweep::default(),
            errors: VecDeque::new(),
            replies: VecDeque::new(),
            history: Vec::new(),
            profile,
        }
    }

    pub fn from_profile_path(path: &Path) -> Result<Self, SigGenError> {
        let profile = SimProfile::load(path)?;
        info!("Simulating {}", profile.identity);
        Ok(Self::new(profile))
    }

    /// Every command received, without terminators, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    pub fn power_dbm(&self) -> f64 {
        self.power_dbm
    }

    pub fn output_on(&self) -> bool {
        self.output_on
    }

    pub fn mode(&self) -> SweepMode {
        self.mode
    }

    pub fn sweep(&self) -> &SimSweep {
        &self.sweep
    }

    /// Queue an error as if the device had raised it.
    pub fn inject_error(&mut self, code: i32, message: &str) {
        self.push_error((code, message));
    }

    fn push_error(&mut self, (code, message): (i32, &str)) {
        if self.errors.len() >= MAX_QUEUED_ERRORS {
            if let Some(last) = self.errors.back_mut() {
                *last = (QUEUE_OVERFLOW.0, QUEUE_OVERFLOW.1.to_string());
            }
            return;
        }
        self.errors.push_back((code, message.to_string()));
    }

    fn reply(&mut self, reply: impl Into<String>) {
        self.replies.push_back(format!("{}{}", reply.into(), protocol::TERMINATOR));
    }

    fn number(&mut self, argument: &str) -> Option<f64> {
        let value = argument
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<f64>().ok());
        if value.is_none() {
            self.push_error(DATA_TYPE_ERROR);
        }
        value
    }

    fn frequency(&mut self, argument: &str) -> Option<f64> {
        let hz = self.number(argument)?;
        if hz < self.profile.min_frequency_hz || hz > self.profile.max_frequency_hz {
            self.push_error(DATA_OUT_OF_RANGE);
            return None;
        }
        Some(hz)
    }

    fn reset(&mut self) {
        let profile = self.profile.clone();
        let history = std::mem::take(&mut self.history);
        *self = Self::new(profile);
        self.history = history;
        self.mode = SweepMode::Cw;
        self.output_on = false;
    }

    fn handle(&mut self, command: &str) {
        let (header, argument) = match command.split_once(char::is_whitespace) {
            Some((header, argument)) => (header, argument.trim()),
            None => (command, ""),
        };
        let header = header.to_ascii_uppercase();

        match header.as_str() {
            "*RST" => self.reset(),
            "*CLS" => self.errors.clear(),
            "*IDN?" => {
                let identity = self.profile.identity.clone();
                self.reply(identity);
            }
            "*OPC?" => self.reply("1"),
            "SYST:ERR?" => match self.errors.pop_front() {
                Some((code, message)) => self.reply(format!("{code},\"{message}\"")),
                None => self.reply("0,\"No error\""),
            },
            "OUTP:STATE" => match argument.to_ascii_uppercase().as_str() {
                "1" => self.output_on = true,
                "0" => self.output_on = false,
                other => match other.parse::<OutputState>() {
                    Ok(state) => self.output_on = state.is_on(),
                    Err(_) => self.push_error(DATA_TYPE_ERROR),
                },
            },
            "OUTP:STATE?" => self.reply(if self.output_on { "1" } else { "0" }),
            "FREQ:CW" => {
                if let Some(hz) = self.frequency(argument) {
                    self.frequency_hz = hz;
                }
            }
            "FREQ:CW?" => self.reply(format_number(self.frequency_hz)),
            "POW:LEV" => {
                if let Some(dbm) = self.number(argument) {
                    if dbm < self.profile.min_power_dbm || dbm > self.profile.max_power_dbm {
                        self.push_error(DATA_OUT_OF_RANGE);
                    } else {
                        self.power_dbm = dbm;
                    }
                }
            }
            "POW:LEV?" => self.reply(format_number(self.power_dbm)),
            "FREQ:MODE" => match argument.to_ascii_uppercase().as_str() {
                "CW" | "FIX" => self.mode = SweepMode::Cw,
                "SWE" | "SWEEP" => self.mode = SweepMode::Sweep,
                _ => self.push_error(DATA_TYPE_ERROR),
            },
            // short form, as R&S instruments answer
            "FREQ:MODE?" => self.reply(match self.mode {
                SweepMode::Cw => "CW",
                SweepMode::Sweep => "SWE",
            }),
            "SOUR:FREQ:START" => {
                if let Some(hz) = self.frequency(argument) {
                    self.sweep.start_hz = hz;
                }
            }
            "SOUR:FREQ:STOP" => {
                if let Some(hz) = self.frequency(argument) {
                    self.sweep.stop_hz = hz;
                }
            }
            "SOUR:SWE:FREQ:SPAC" => match argument.to_ascii_uppercase().as_str() {
                "LIN" | "LINEAR" => self.sweep.linear = true,
                "LOG" | "LOGARITHMIC" => self.sweep.linear = false,
                _ => self.push_error(DATA_TYPE_ERROR),
            },
            "SOUR:SWE:FREQ:STEP:LIN" => {
                if let Some(hz) = self.number(argument) {
                    self.sweep.step_hz = hz;
                }
            }
            "SOUR:SWE:FREQ:DWEL" => {
                if let Some(ms) = self.number(argument) {
                    self.sweep.dwell_ms = ms;
                }
            }
            "TRIG:FSW:SOUR" => self.sweep.trigger = argument.to_ascii_uppercase(),
            "SOUR:SWE:FREQ:MODE" => match argument.parse::<SweepType>() {
                Ok(sweep_type) => self.sweep.sweep_type = Some(sweep_type),
                Err(_) => self.push_error(DATA_TYPE_ERROR),
            },
            "SOUR:SWE:FREQ:EXEC" => {
                if self.mode == SweepMode::Sweep {
                    self.sweep.running = true;
                } else {
                    self.push_error(SETTINGS_CONFLICT);
                }
            }
            _ => {
                debug!("Simulator: undefined header {header}");
                self.push_error(UNDEFINED_HEADER);
            }
        }

        if self.mode == SweepMode::Cw {
            self.sweep.running = false;
        }
    }
}

impl Transport for SimulatedInstrument {
    fn send(&mut self, message: &str) -> Result<(), SigGenError> {
        for command in message.lines().map(str::trim).filter(|c| !c.is_empty()) {
            self.history.push(command.to_string());
            self.handle(command);
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<String, SigGenError> {
        // a real device leaves the read hanging until the transport times out
        self.replies.pop_front().ok_or(SigGenError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{InstrumentSession, SessionConfig};
    use std::path::PathBuf;

    fn temp_profile(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("rf_siggen_{}_{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_settings_and_queries() {
        let mut sim = SimulatedInstrument::default();
        sim.send("FREQ:CW 2400000000\n").unwrap();
        sim.send("POW:LEV -10.5\n").unwrap();
        sim.send("OUTP:STATE ON\n").unwrap();
        sim.send("FREQ:CW?\n").unwrap();
        assert_eq!(sim.receive().unwrap(), "2400000000\n");
        sim.send("POW:LEV?\n").unwrap();
        assert_eq!(sim.receive().unwrap(), "-10.5\n");
        sim.send("OUTP:STATE?\n").unwrap();
        assert_eq!(sim.receive().unwrap(), "1\n");
        assert!(matches!(sim.receive(), Err(SigGenError::Timeout)));
    }

    #[test]
    fn test_error_queue() {
        let mut sim = SimulatedInstrument::default();
        sim.send("FREQ:CW 1\n").unwrap();
        sim.send("BOGUS:CMD\n").unwrap();
        sim.send("SYST:ERR?\n").unwrap();
        assert_eq!(sim.receive().unwrap(), "-222,\"Data out of range\"\n");
        sim.send("SYST:ERR?\n").unwrap();
        assert_eq!(sim.receive().unwrap(), "-113,\"Undefined header\"\n");
        sim.send("SYST:ERR?\n").unwrap();
        assert_eq!(sim.receive().unwrap(), "0,\"No error\"\n");
        assert_eq!(sim.frequency_hz(), 1e9);
    }

    #[test]
    fn test_error_queue_overflow() {
        let mut sim = SimulatedInstrument::default();
        for _ in 0..(MAX_QUEUED_ERRORS + 3) {
            sim.inject_error(-200, "Execution error");
        }
        let mut drained = Vec::new();
        loop {
            sim.send("SYST:ERR?").unwrap();
            let reply = sim.receive().unwrap();
            if reply.contains("No error") {
                break;
            }
            drained.push(reply);
        }
        assert_eq!(drained.len(), MAX_QUEUED_ERRORS);
        assert_eq!(drained.last().unwrap(), "-350,\"Queue overflow\"\n");
    }

    #[test]
    fn test_sweep_execution_requires_sweep_mode() {
        let mut sim = SimulatedInstrument::default();
        sim.send("SOUR:SWE:FREQ:EXEC\n").unwrap();
        assert!(!sim.sweep().running);
        sim.send("FREQ:MODE SWEEP\nSOUR:SWE:FREQ:EXEC\n").unwrap();
        assert!(sim.sweep().running);
        sim.send("FREQ:MODE CW\n").unwrap();
        assert!(!sim.sweep().running);
        sim.send("SYST:ERR?\n").unwrap();
        assert_eq!(sim.receive().unwrap(), "-221,\"Settings conflict\"\n");
    }

    #[test]
    fn test_reset_restores_profile() {
        let mut sim = SimulatedInstrument::default();
        sim.send("FREQ:CW 3000000000\nFREQ:MODE SWEEP\nOUTP:STATE ON\n").unwrap();
        sim.send("*RST\n").unwrap();
        assert_eq!(sim.frequency_hz(), 1e9);
        assert_eq!(sim.mode(), SweepMode::Cw);
        assert!(!sim.output_on());
        assert_eq!(sim.history().len(), 4);
    }

    #[test]
    fn test_profile_from_file_overrides_defaults() {
        let path = temp_profile(
            "smf.toml",
            "identity = \"Rohde&Schwarz,SMF100A,1167.0000K02/1,2.15\"\nfrequency_hz = 5e9\nmode = \"sweep\"\n",
        );
        let profile = SimProfile::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(profile.identity, "Rohde&Schwarz,SMF100A,1167.0000K02/1,2.15");
        assert_eq!(profile.frequency_hz, 5e9);
        assert_eq!(profile.mode, SweepMode::Sweep);
        assert_eq!(profile.max_power_dbm, SimProfile::default().max_power_dbm);
    }

    #[test]
    fn test_bundled_profile_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("profiles/sma100a.toml");
        assert_eq!(SimProfile::load(&path).unwrap(), SimProfile::default());
    }

    #[test]
    fn test_session_opens_simulation() {
        let path = temp_profile("session.json", "{\"identity\": \"Acme,SG1,7,0.1\"}");
        let config = SessionConfig {
            simulation: Some(path.clone()),
            ..SessionConfig::default()
        };
        let mut session = InstrumentSession::open("GPIB0::28::INSTR", &config).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(session.query("*IDN?").unwrap(), "Acme,SG1,7,0.1");
    }

    #[test]
    fn test_missing_profile_is_config_error() {
        let missing = std::env::temp_dir().join("rf_siggen_does_not_exist.toml");
        assert!(matches!(
            SimulatedInstrument::from_profile_path(&missing),
            Err(SigGenError::Config(_))
        ));
    }
}
