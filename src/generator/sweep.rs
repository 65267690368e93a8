use super::SignalGenerator;
use super::frequency::check_frequency;
use crate::error::SigGenError;
use crate::instrument::Transport;
use crate::protocol::{self, command, format_number};
use crate::types::{SweepConfig, SweepMode};
use log::{debug, info};

impl<T: Transport> SignalGenerator<T> {
    /// Configure a linear frequency sweep.
    ///
    /// All parameters are validated first, so a rejected configuration sends
    /// nothing. The sequence is then:
    ///
    /// 1. with `force_sweep_mode`, a generator found in CW mode is switched to
    ///    SWEEP and re-centered on the start frequency
    /// 2. start, stop, linear spacing, step, dwell and automatic trigger
    /// 3. the sweep type (`AUTO`, `SINGLE`, `STEP`)
    /// 4. SWEEP mode is confirmed, and set if the device reports otherwise
    /// 5. with `execute`, the sweep is started
    ///
    /// The first failing step aborts the rest.
    ///
    /// # Errors
    /// Returns `SigGenError::InvalidValue` for a zero, negative or non-finite
    /// start/stop/step, or a requested mode other than SWEEP.
    ///
    /// # Examples
    /// ```no_run
    /// use rf_siggen::{SignalGenerator, SweepConfig, SweepType, Unit};
    ///
    /// let mut generator = SignalGenerator::builder()
    ///     .resource("GPIB0::28::INSTR")
    ///     .build()?;
    ///
    /// let sweep = SweepConfig::new(100.0, 1000.0)
    ///     .unit(Unit::MHz)
    ///     .step(10.0)
    ///     .dwell_ms(20)
    ///     .sweep_type(SweepType::Auto)
    ///     .execute(true);
    /// generator.setup_sweep(&sweep)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn setup_sweep(&mut self, sweep: &SweepConfig) -> Result<(), SigGenError> {
        sweep.validate()?;
        if sweep.force_sweep_mode {
            // may become the CW frequency below
            check_frequency("start frequency", sweep.start)?;
        }

        let unit = sweep.unit;
        debug!("Setting up sweep {sweep:?}");

        if sweep.force_sweep_mode && self.get_mode()? == SweepMode::Cw {
            info!("Switching from CW to SWEEP mode");
            self.set_mode(SweepMode::Sweep)?;
            self.set_center_frequency(sweep.start, unit)?;
        }

        self.send(&command(protocol::SWEEP_START, format_number(unit.to_hz(sweep.start))))?;
        self.send(&command(protocol::SWEEP_STOP, format_number(unit.to_hz(sweep.stop))))?;
        self.send(protocol::SWEEP_SPACING_LINEAR)?;
        self.send(&command(protocol::SWEEP_STEP_LINEAR, format_number(unit.to_hz(sweep.step))))?;
        self.send(&command(protocol::SWEEP_DWELL, format!("{} ms", sweep.dwell_ms)))?;
        self.send(protocol::SWEEP_TRIGGER_AUTO)?;

        self.send(&command(protocol::SWEEP_TYPE, sweep.sweep_type))?;

        if self.get_mode()? != SweepMode::Sweep {
            self.set_mode(SweepMode::Sweep)?;
        }

        if sweep.execute {
            self.start_sweep()?;
        }
        Ok(())
    }

    /// Enter SWEEP mode and execute the configured sweep.
    pub fn start_sweep(&mut self) -> Result<(), SigGenError> {
        self.set_mode(SweepMode::Sweep)?;
        self.send(protocol::SWEEP_EXECUTE)
    }

    /// Stop sweeping by returning to CW mode.
    pub fn stop_sweep(&mut self) -> Result<(), SigGenError> {
        self.set_mode(SweepMode::Cw)
    }
}
