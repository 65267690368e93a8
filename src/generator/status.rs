use super::SignalGenerator;
use crate::error::SigGenError;
use crate::instrument::Transport;
use crate::protocol::{self, parse_error_reply, parse_i64, parse_identity};
use crate::types::{DeviceError, Identity};
use log::{info, warn};

impl<T: Transport> SignalGenerator<T> {
    /// Query `*IDN?` and check the model against the known list.
    ///
    /// The model is the second comma separated field of the reply. A model
    /// outside [`DriverConfig::known_models`](super::DriverConfig) is
    /// reported with a warning; the driver keeps working with it.
    ///
    /// # Errors
    /// Returns `SigGenError::Protocol` if the reply has no model field, or
    /// the transport error if the query fails.
    ///
    /// # Examples
    /// ```no_run
    /// use rf_siggen::SignalGenerator;
    ///
    /// let mut generator = SignalGenerator::builder()
    ///     .resource("GPIB0::28::INSTR")
    ///     .build()?;
    /// let identity = generator.identify()?;
    /// println!("Connected to {identity}");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn identify(&mut self) -> Result<Identity, SigGenError> {
        let reply = self.session.query(protocol::IDENTIFY)?;
        let identity = parse_identity(&reply)?;

        if identity.is_known(&self.config.known_models) {
            info!("Connected to {identity}");
        } else {
            warn!(
                "Instrument model {} is not known or tested, driver may not interface correctly",
                identity.model
            );
        }

        self.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Reset the instrument to its preset state (`*RST`).
    pub fn reset(&mut self) -> Result<(), SigGenError> {
        self.send(protocol::RESET)
    }

    /// Clear the status registers and error queue (`*CLS`), and forget the
    /// device errors collected so far.
    pub fn clear_state(&mut self) -> Result<(), SigGenError> {
        self.send(protocol::CLEAR_STATUS)?;
        self.device_errors.clear();
        Ok(())
    }

    /// Block until the instrument reports all pending operations complete.
    ///
    /// `*OPC?` answers `1` once the preceding commands have been processed.
    pub fn wait_complete(&mut self) -> Result<(), SigGenError> {
        let reply = self.session.query(protocol::OPERATION_COMPLETE)?;
        match parse_i64(&reply, "operation complete flag")? {
            1 => Ok(()),
            other => Err(SigGenError::Protocol(format!(
                "Unexpected *OPC? reply: {other}"
            ))),
        }
    }

    /// Read one entry of the error queue; `None` if the queue is empty.
    pub fn get_error(&mut self) -> Result<Option<DeviceError>, SigGenError> {
        let reply = self.session.query(protocol::SYSTEM_ERROR)?;
        Ok(parse_error_reply(&reply, None))
    }

    /// Drain the error queue.
    ///
    /// Reads `SYST:ERR?` until the instrument reports "No error", at most
    /// `max_error_drain` times. An empty vector means no error was present.
    ///
    /// # Examples
    /// ```no_run
    /// use rf_siggen::SignalGenerator;
    ///
    /// let mut generator = SignalGenerator::builder()
    ///     .resource("GPIB0::28::INSTR")
    ///     .build()?;
    /// for error in generator.get_errors()? {
    ///     println!("{error}");
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn get_errors(&mut self) -> Result<Vec<DeviceError>, SigGenError> {
        self.drain_errors(None)
    }

    pub(crate) fn drain_errors(
        &mut self,
        command: Option<&str>,
    ) -> Result<Vec<DeviceError>, SigGenError> {
        let mut errors = Vec::new();
        for _ in 0..self.config.max_error_drain {
            let reply = self.session.query(protocol::SYSTEM_ERROR)?;
            match parse_error_reply(&reply, command) {
                Some(error) => errors.push(error),
                None => return Ok(errors),
            }
        }
        warn!(
            "Error queue still not empty after {} reads",
            self.config.max_error_drain
        );
        Ok(errors)
    }
}
