use crate::error::SigGenError;
use crate::protocol::TERMINATOR;
use log::{debug, info, trace, warn};
use std::path::PathBuf;
use std::time::Duration;

pub mod sim;
pub mod tcp;
#[cfg(feature = "visa")]
pub mod visa;

pub use sim::{SimProfile, SimulatedInstrument};
pub use tcp::TcpTransport;
#[cfg(feature = "visa")]
pub use visa::VisaTransport;

/// Byte pipe to an instrument, carrying one message per line.
///
/// Implementations only move text; termination, logging and the closed state
/// are handled by [`InstrumentSession`].
pub trait Transport {
    /// Send one complete, already terminated message.
    fn send(&mut self, message: &str) -> Result<(), SigGenError>;

    /// Receive one reply line, terminator included.
    fn receive(&mut self) -> Result<String, SigGenError>;

    /// Throw away input left over from an interrupted exchange, such as a
    /// reply that arrived after its read timed out.
    fn discard_pending(&mut self) -> Result<(), SigGenError> {
        Ok(())
    }

    /// Release the underlying handle.
    fn close(&mut self) -> Result<(), SigGenError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, message: &str) -> Result<(), SigGenError> {
        (**self).send(message)
    }

    fn receive(&mut self) -> Result<String, SigGenError> {
        (**self).receive()
    }

    fn discard_pending(&mut self) -> Result<(), SigGenError> {
        (**self).discard_pending()
    }

    fn close(&mut self) -> Result<(), SigGenError> {
        (**self).close()
    }
}

/// Settings used when opening a session.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rf_siggen::SessionConfig;
///
/// let config = SessionConfig {
///     timeout: Duration::from_secs(2),
///     simulation: None,
/// };
/// assert_eq!(config.timeout, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// I/O timeout handed to the transport
    pub timeout: Duration,
    /// Simulation profile; when set, the resource name is not dialled
    pub simulation: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            simulation: None,
        }
    }
}

/// A parsed VISA-style resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// `TCPIP[board]::<host>::<port>::SOCKET`
    TcpSocket { host: String, port: u16 },
    /// Anything else is handed to the VISA library verbatim
    Visa(String),
}

impl Resource {
    pub fn parse(resource: &str) -> Result<Self, SigGenError> {
        let resource = resource.trim();
        if resource.is_empty() {
            return Err(SigGenError::InvalidAddress("empty resource name".to_string()));
        }

        let parts: Vec<&str> = resource.split("::").collect();
        let is_socket = parts.len() == 4
            && parts[0].to_ascii_uppercase().starts_with("TCPIP")
            && parts[3].eq_ignore_ascii_case("SOCKET");

        if is_socket {
            let port = parts[2]
                .parse::<u16>()
                .map_err(|_| SigGenError::InvalidAddress(resource.to_string()))?;
            return Ok(Resource::TcpSocket {
                host: parts[1].to_string(),
                port,
            });
        }

        Ok(Resource::Visa(resource.to_string()))
    }
}

/// An open connection to one instrument.
///
/// Owns its transport exclusively; all I/O takes `&mut self`, so a session
/// can't be driven from two callers at once. Transport failures are returned
/// to the caller, never swallowed.
///
/// A failed read leaves the session out of sync: the reply may still arrive
/// later. The next write first discards whatever input is pending, so a late
/// reply is never taken as the answer to a newer query.
pub struct InstrumentSession<T: Transport = Box<dyn Transport>> {
    transport: T,
    resource: String,
    closed: bool,
    out_of_sync: bool,
}

impl InstrumentSession {
    /// Open a session for a resource name.
    ///
    /// A simulation profile in `config` takes precedence. Otherwise raw
    /// socket resources are dialled directly and everything else goes
    /// through VISA, which requires the `visa` feature.
    ///
    /// # Examples
    /// ```no_run
    /// use rf_siggen::{InstrumentSession, SessionConfig};
    ///
    /// let mut session =
    ///     InstrumentSession::open("TCPIP0::192.168.0.20::5025::SOCKET", &SessionConfig::default())?;
    /// println!("{}", session.query("*IDN?")?);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(resource: &str, config: &SessionConfig) -> Result<Self, SigGenError> {
        let transport: Box<dyn Transport> = match &config.simulation {
            Some(path) => {
                info!("Opening simulated instrument for {resource} from {}", path.display());
                Box::new(SimulatedInstrument::from_profile_path(path)?)
            }
            None => match Resource::parse(resource)? {
                Resource::TcpSocket { host, port } => {
                    Box::new(TcpTransport::connect(&host, port, config.timeout)?)
                }
                Resource::Visa(name) => open_visa(&name, config.timeout)?,
            },
        };

        Ok(InstrumentSession::new(transport, resource))
    }
}

#[cfg(feature = "visa")]
fn open_visa(resource: &str, timeout: Duration) -> Result<Box<dyn Transport>, SigGenError> {
    Ok(Box::new(VisaTransport::open(resource, timeout)?))
}

#[cfg(not(feature = "visa"))]
fn open_visa(resource: &str, _timeout: Duration) -> Result<Box<dyn Transport>, SigGenError> {
    Err(SigGenError::InvalidAddress(format!(
        "{resource} needs VISA support, build with the `visa` feature"
    )))
}

impl<T: Transport> InstrumentSession<T> {
    pub fn new(transport: T, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        info!("Session opened for {resource}");
        Self {
            transport,
            resource,
            closed: false,
            out_of_sync: false,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_out_of_sync(&self) -> bool {
        self.out_of_sync
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn ensure_open(&self) -> Result<(), SigGenError> {
        if self.closed {
            return Err(SigGenError::SessionClosed);
        }
        Ok(())
    }

    /// Send a command without waiting for a reply.
    pub fn write(&mut self, command: &str) -> Result<(), SigGenError> {
        self.ensure_open()?;
        if self.out_of_sync {
            debug!("[{}] discarding pending input before {command:?}", self.resource);
            self.transport.discard_pending()?;
            self.out_of_sync = false;
        }
        debug!("[{}] >> {}", self.resource, command);
        let message = format!("{command}{TERMINATOR}");
        self.transport.send(&message).map_err(|e| {
            warn!("[{}] write of {command:?} failed: {e}", self.resource);
            e
        })
    }

    /// Read a pending reply without sending anything.
    pub fn read(&mut self) -> Result<String, SigGenError> {
        self.ensure_open()?;
        let reply = match self.transport.receive() {
            Ok(reply) => reply,
            Err(e) => {
                warn!("[{}] read failed: {e}", self.resource);
                self.out_of_sync = true;
                return Err(e);
            }
        };
        let reply = reply.trim_end_matches(['\r', '\n']).to_string();
        trace!("[{}] << {}", self.resource, reply);
        Ok(reply)
    }

    /// Send a command and return its reply.
    pub fn query(&mut self, command: &str) -> Result<String, SigGenError> {
        self.write(command)?;
        self.read()
    }

    /// Release the transport. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), SigGenError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close()?;
        info!("Connection to {} has been closed", self.resource);
        Ok(())
    }
}

impl<T: Transport> Drop for InstrumentSession<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
