use super::SignalGenerator;
use crate::error::SigGenError;
use crate::instrument::Transport;
use crate::protocol::{self, command, format_number, parse_f64, query_of};

impl<T: Transport> SignalGenerator<T> {
    /// Set the RF output level in dBm (`POW:LEV`).
    ///
    /// No range is enforced here; a level the instrument can't produce shows
    /// up in [`device_errors`](Self::device_errors).
    ///
    /// # Errors
    /// Returns `SigGenError::InvalidValue` if `power` is NaN or infinite.
    pub fn set_output_power(&mut self, power: impl Into<f64>) -> Result<(), SigGenError> {
        let power = power.into();
        if !power.is_finite() {
            return Err(SigGenError::invalid("power", power));
        }
        self.send(&command(protocol::POWER_LEVEL, format_number(power)))
    }

    pub fn get_output_power(&mut self) -> Result<f64, SigGenError> {
        let reply = self.session.query(&query_of(protocol::POWER_LEVEL))?;
        parse_f64(&reply, "power")
    }
}
