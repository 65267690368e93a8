use super::Transport;
use crate::error::SigGenError;
use log::{debug, warn};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

const DISCARD_CHUNK: usize = 256;

/// Raw SCPI socket transport (`TCPIP::<host>::<port>::SOCKET`).
///
/// Most generators listen on port 5025 for newline terminated SCPI.
pub struct TcpTransport {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    peer: String,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, SigGenError> {
        let peer = format!("{host}:{port}");
        let socket_addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| SigGenError::InvalidAddress(peer.clone()))?
            .next()
            .ok_or_else(|| SigGenError::InvalidAddress(peer.clone()))?;

        debug!("Connecting to {peer}");

        let stream = TcpStream::connect_timeout(&socket_addr, timeout).map_err(|e| {
            warn!("Failed to connect to {peer}: {e}");
            SigGenError::io(e, format!("Failed to connect to {peer}"))
        })?;

        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| SigGenError::io(e, "Setting read timeout"))?;
        stream
            .set_write_timeout(Some(timeout))
            .map_err(|e| SigGenError::io(e, "Setting write timeout"))?;
        stream
            .set_nodelay(true)
            .map_err(|e| SigGenError::io(e, "Disabling Nagle"))?;

        let reader = BufReader::new(
            stream
                .try_clone()
                .map_err(|e| SigGenError::io(e, "Cloning socket for reading"))?,
        );

        debug!("Successfully connected to {peer}");

        Ok(Self {
            stream,
            reader,
            peer,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, message: &str) -> Result<(), SigGenError> {
        self.stream
            .write_all(message.as_bytes())
            .and_then(|_| self.stream.flush())
            .map_err(|e| SigGenError::io(e, format!("Writing to {}", self.peer)))
    }

    fn receive(&mut self) -> Result<String, SigGenError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| SigGenError::io(e, format!("Reading from {}", self.peer)))?;
        if read == 0 {
            return Err(SigGenError::io(
                std::io::Error::new(ErrorKind::UnexpectedEof, "connection closed"),
                format!("Reading from {}", self.peer),
            ));
        }
        Ok(line)
    }

    /// Drops buffered input, then anything that arrives within one read
    /// timeout of the last received byte.
    fn discard_pending(&mut self) -> Result<(), SigGenError> {
        let mut discarded = self.reader.buffer().len();
        self.reader.consume(discarded);

        let mut chunk = [0u8; DISCARD_CHUNK];
        loop {
            match self.reader.get_mut().read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => discarded += read,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(SigGenError::io(e, format!("Discarding input from {}", self.peer)));
                }
            }
        }

        if discarded > 0 {
            debug!("Discarded {discarded} stale bytes from {}", self.peer);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SigGenError> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(SigGenError::io(e, format!("Closing {}", self.peer))),
        }
    }
}
