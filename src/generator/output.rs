use super::SignalGenerator;
use crate::error::SigGenError;
use crate::instrument::Transport;
use crate::protocol::{self, command, parse_i64, query_of};
use crate::types::{IntoParam, OutputState};

impl<T: Transport> SignalGenerator<T> {
    /// Switch the RF output on or off.
    ///
    /// Accepts a `bool`, an [`OutputState`] or the tokens `"ON"`/`"OFF"`;
    /// all of them send the same `OUTP:STATE` command.
    ///
    /// # Errors
    /// Returns `SigGenError::InvalidValue` for any other token, before
    /// anything is written.
    ///
    /// # Examples
    /// ```no_run
    /// use rf_siggen::SignalGenerator;
    ///
    /// let mut generator = SignalGenerator::builder()
    ///     .resource("GPIB0::28::INSTR")
    ///     .build()?;
    /// generator.set_output_state(true)?;
    /// generator.set_output_state("OFF")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn set_output_state(
        &mut self,
        state: impl IntoParam<OutputState>,
    ) -> Result<(), SigGenError> {
        let state = state.into_param()?;
        self.send(&command(protocol::OUTPUT_STATE, state))
    }

    /// True if the device reports the output on (`1`).
    pub fn get_output_state(&mut self) -> Result<bool, SigGenError> {
        let reply = self.session.query(&query_of(protocol::OUTPUT_STATE))?;
        Ok(parse_i64(&reply, "output state")? == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{DriverConfig, SignalGenerator};
    use crate::error::SigGenError;
    use crate::instrument::InstrumentSession;
    use crate::instrument::testing::ScriptedTransport;
    use crate::types::OutputState;

    fn scripted(replies: &[&str]) -> SignalGenerator<ScriptedTransport> {
        let mut all = vec!["Rohde&Schwarz,SMF100A,1,1"];
        all.extend_from_slice(replies);
        let session = InstrumentSession::new(ScriptedTransport::with_replies(&all), "scripted");
        let config = DriverConfig {
            confirm_commands: false,
            ..DriverConfig::default()
        };
        SignalGenerator::connect(session, config).unwrap()
    }

    #[test]
    fn test_bool_and_token_send_same_command() {
        let mut generator = simulated();
        generator.set_output_state(true).unwrap();
        generator.set_output_state("ON").unwrap();
        generator.set_output_state(OutputState::Off).unwrap();
        generator.set_output_state("off").unwrap();

        assert_eq!(
            settings_sent(&generator),
            ["OUTP:STATE ON", "OUTP:STATE ON", "OUTP:STATE OFF", "OUTP:STATE OFF"]
        );
    }

    #[test]
    fn test_invalid_token_is_rejected_without_write() {
        let mut generator = simulated();
        let err = generator.set_output_state("ENABLED").unwrap_err();
        assert!(matches!(
            err,
            SigGenError::InvalidValue { field: "output state", .. }
        ));
        assert!(sent_after_connect(&generator).is_empty());
    }

    #[test]
    fn test_get_output_state_parses_integer_reply() {
        let mut generator = scripted(&["1", "0", "2"]);
        assert!(generator.get_output_state().unwrap());
        assert!(!generator.get_output_state().unwrap());
        assert!(!generator.get_output_state().unwrap());
        assert_eq!(generator.session().transport().sent[1], "OUTP:STATE?\n");
    }

    #[test]
    fn test_get_output_state_rejects_non_integer() {
        let mut generator = scripted(&["ON"]);
        assert!(matches!(
            generator.get_output_state(),
            Err(SigGenError::Protocol(_))
        ));
    }

    #[test]
    fn test_output_state_round_trip_through_simulator() {
        let mut generator = simulated();
        generator.set_output_state(true).unwrap();
        assert!(generator.get_output_state().unwrap());
        generator.set_output_state(false).unwrap();
        assert!(!generator.get_output_state().unwrap());
    }
}
