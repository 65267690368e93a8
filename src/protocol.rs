use chrono::Utc;

use crate::error::SigGenError;
use crate::types::{DeviceError, Identity};

// IEEE 488.2 common commands
pub const RESET: &str = "*RST";
pub const CLEAR_STATUS: &str = "*CLS";
pub const IDENTIFY: &str = "*IDN?";
pub const OPERATION_COMPLETE: &str = "*OPC?";
pub const SYSTEM_ERROR: &str = "SYST:ERR?";

pub const OUTPUT_STATE: &str = "OUTP:STATE";
pub const CW_FREQUENCY: &str = "FREQ:CW";
pub const POWER_LEVEL: &str = "POW:LEV";
pub const FREQUENCY_MODE: &str = "FREQ:MODE";

pub const SWEEP_START: &str = "SOUR:FREQ:START";
pub const SWEEP_STOP: &str = "SOUR:FREQ:STOP";
pub const SWEEP_SPACING_LINEAR: &str = "SOUR:SWE:FREQ:SPAC LIN";
pub const SWEEP_STEP_LINEAR: &str = "SOUR:SWE:FREQ:STEP:LIN";
pub const SWEEP_DWELL: &str = "SOUR:SWE:FREQ:DWEL";
pub const SWEEP_TRIGGER_AUTO: &str = "TRIG:FSW:SOUR AUTO";
pub const SWEEP_TYPE: &str = "SOUR:SWE:FREQ:MODE";
pub const SWEEP_EXECUTE: &str = "SOUR:SWE:FREQ:EXEC";

pub const TERMINATOR: char = '\n';

/// Query form of a setting header, `FREQ:CW` -> `FREQ:CW?`.
pub fn query_of(header: &str) -> String {
    format!("{header}?")
}

/// Setting command `<header> <value>`.
pub fn command(header: &str, value: impl std::fmt::Display) -> String {
    format!("{header} {value}")
}

/// Format a number for transmission.
///
/// Plain decimal notation, never an exponent, and integral values carry no
/// fractional part: `2.4e9` becomes `2400000000`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // avoid "-0"
        return "0".to_string();
    }
    format!("{value}")
}

/// Strip line terminators and surrounding quotes from a reply.
pub fn clean_reply(reply: &str) -> &str {
    reply.trim().trim_matches('"')
}

pub fn parse_f64(reply: &str, what: &str) -> Result<f64, SigGenError> {
    let cleaned = clean_reply(reply);
    cleaned
        .parse::<f64>()
        .map_err(|_| SigGenError::Protocol(format!("Expected {what} as number, got {cleaned:?}")))
}

pub fn parse_i64(reply: &str, what: &str) -> Result<i64, SigGenError> {
    let cleaned = clean_reply(reply);
    cleaned
        .parse::<i64>()
        .map_err(|_| SigGenError::Protocol(format!("Expected {what} as integer, got {cleaned:?}")))
}

/// Split a `*IDN?` reply into its comma separated fields.
///
/// The model is field index 1; a reply without it is a protocol error.
pub fn parse_identity(reply: &str) -> Result<Identity, SigGenError> {
    let mut fields = reply.trim().split(',').map(str::trim);
    let manufacturer = fields.next().unwrap_or_default().to_string();
    let model = fields
        .next()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| SigGenError::Protocol(format!("Identification reply without model: {reply:?}")))?
        .to_string();
    let optional = |field: Option<&str>| field.filter(|f| !f.is_empty()).map(str::to_string);
    let serial = optional(fields.next());
    let firmware = optional(fields.next());

    Ok(Identity {
        manufacturer,
        model,
        serial,
        firmware,
    })
}

/// Interpret one `SYST:ERR?` reply.
///
/// Returns `None` when the queue is empty: the reply mentions "No error" or
/// carries code 0. Otherwise `<code>,"<message>"` is split, falling back to
/// the whole text as message when no integer code leads the reply.
pub fn parse_error_reply(reply: &str, command: Option<&str>) -> Option<DeviceError> {
    let text = reply.trim();
    if text.is_empty() || text.to_ascii_lowercase().contains("no error") {
        return None;
    }

    let (code, message) = match text.split_once(',') {
        Some((code, message)) => match code.trim().parse::<i32>() {
            Ok(code) => (Some(code), clean_reply(message).to_string()),
            Err(_) => (None, text.to_string()),
        },
        None => match text.parse::<i32>() {
            Ok(code) => (Some(code), String::new()),
            Err(_) => (None, text.to_string()),
        },
    };

    if code == Some(0) {
        return None;
    }

    Some(DeviceError {
        code,
        message,
        command: command.map(str::to_string),
        observed_at: Utc::now(),
    })
}
