use super::SignalGenerator;
use crate::error::SigGenError;
use crate::instrument::Transport;
use crate::protocol::{self, command, format_number, parse_f64, query_of};
use crate::types::{IntoParam, SweepMode, Unit};

/// Lowest frequency accepted by the setters, in the caller's unit.
pub const MIN_FREQUENCY: f64 = 1.0;

pub(crate) fn check_frequency(field: &'static str, value: f64) -> Result<f64, SigGenError> {
    if !value.is_finite() || value < MIN_FREQUENCY {
        return Err(SigGenError::invalid(field, value));
    }
    Ok(value)
}

impl<T: Transport> SignalGenerator<T> {
    /// Set the CW (center) frequency.
    ///
    /// The value is converted to Hz and sent as `FREQ:CW <Hz>`.
    ///
    /// # Arguments
    /// * `frequency` - Frequency in `unit`, at least 1
    /// * `unit` - A [`Unit`] or its token, case-insensitive (`"MHz"`, `"mhz"`)
    ///
    /// # Errors
    /// Returns `SigGenError::InvalidValue` for an unknown unit or a frequency
    /// below 1 (or not finite). Nothing is sent in that case.
    ///
    /// # Examples
    /// ```no_run
    /// use rf_siggen::{SignalGenerator, Unit};
    ///
    /// let mut generator = SignalGenerator::builder()
    ///     .resource("GPIB0::28::INSTR")
    ///     .build()?;
    ///
    /// // sends FREQ:CW 2400000000
    /// generator.set_center_frequency(2400, "MHz")?;
    /// generator.set_center_frequency(2.45, Unit::GHz)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn set_center_frequency(
        &mut self,
        frequency: impl Into<f64>,
        unit: impl IntoParam<Unit>,
    ) -> Result<(), SigGenError> {
        let unit = unit.into_param()?;
        let frequency = check_frequency("frequency", frequency.into())?;
        let hz = unit.to_hz(frequency);
        self.send(&command(protocol::CW_FREQUENCY, format_number(hz)))
    }

    /// Read the CW frequency, expressed in `unit`.
    pub fn get_center_frequency(&mut self, unit: impl IntoParam<Unit>) -> Result<f64, SigGenError> {
        let unit = unit.into_param()?;
        let reply = self.session.query(&query_of(protocol::CW_FREQUENCY))?;
        Ok(unit.from_hz(parse_f64(&reply, "frequency")?))
    }

    /// Select CW or SWEEP frequency mode (`FREQ:MODE`).
    ///
    /// # Errors
    /// Returns `SigGenError::InvalidValue` for anything but `CW` or `SWEEP`;
    /// no command is written then.
    pub fn set_mode(&mut self, mode: impl IntoParam<SweepMode>) -> Result<(), SigGenError> {
        let mode = mode.into_param()?;
        self.send(&command(protocol::FREQUENCY_MODE, mode))
    }

    pub fn get_mode(&mut self) -> Result<SweepMode, SigGenError> {
        let reply = self.session.query(&query_of(protocol::FREQUENCY_MODE))?;
        SweepMode::from_reply(&reply)
    }
}
