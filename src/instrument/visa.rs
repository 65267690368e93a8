use super::Transport;
use crate::error::SigGenError;
use log::debug;
use std::ffi::CString;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use visa_rs::prelude::*;

const READ_CHUNK: usize = 1024;

/// Transport through the system VISA library (GPIB, USB-TMC, VXI-11, ...).
pub struct VisaTransport {
    // dropped before the resource manager, which would close it anyway
    instrument: Instrument,
    _rm: DefaultRM,
    resource: String,
}

impl VisaTransport {
    pub fn open(resource: &str, timeout: Duration) -> Result<Self, SigGenError> {
        let rm = DefaultRM::new().map_err(|e| SigGenError::Visa(format!("{e:?}")))?;
        let name = CString::new(resource)
            .map_err(|_| SigGenError::InvalidAddress(resource.to_string()))?;

        debug!("Opening VISA resource {resource}");
        let instrument = rm
            .open(&name.into(), AccessMode::NO_LOCK, timeout)
            .map_err(|e| SigGenError::Visa(format!("Failed to open {resource}: {e:?}")))?;

        Ok(Self {
            instrument,
            _rm: rm,
            resource: resource.to_string(),
        })
    }
}

impl Transport for VisaTransport {
    fn send(&mut self, message: &str) -> Result<(), SigGenError> {
        self.instrument
            .write_all(message.as_bytes())
            .map_err(|e| SigGenError::io(e, format!("Writing to {}", self.resource)))
    }

    fn receive(&mut self) -> Result<String, SigGenError> {
        let mut reply = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let read = (&self.instrument)
                .read(&mut chunk)
                .map_err(|e| SigGenError::io(e, format!("Reading from {}", self.resource)))?;
            reply.extend_from_slice(&chunk[..read]);
            if read < READ_CHUNK || reply.ends_with(b"\n") {
                break;
            }
        }
        reply_text(reply, &self.resource)
    }

    /// Reads until the instrument times out; a timeout here just means
    /// nothing is pending.
    fn discard_pending(&mut self) -> Result<(), SigGenError> {
        let mut discarded = 0;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match (&self.instrument).read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => discarded += read,
                Err(e) => {
                    debug!("Stopped discarding input from {}: {e}", self.resource);
                    break;
                }
            }
        }
        if discarded > 0 {
            debug!("Discarded {discarded} stale bytes from {}", self.resource);
        }
        Ok(())
    }
}

/// An empty read is end of input, not an empty reply.
fn reply_text(reply: Vec<u8>, resource: &str) -> Result<String, SigGenError> {
    if reply.is_empty() {
        return Err(SigGenError::io(
            std::io::Error::new(ErrorKind::UnexpectedEof, "empty reply"),
            format!("Reading from {resource}"),
        ));
    }
    String::from_utf8(reply)
        .map_err(|_| SigGenError::Protocol(format!("Non UTF-8 reply from {resource}")))
}
