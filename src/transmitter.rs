//! Transmitter module - datagram transport to the collector
//!
//! The [`Transport`] trait is the seam between the Network Bridge and the
//! socket. [`UdpTransport`] is the production implementation; tests swap in
//! flaky or recording transports.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::errors::Result;

/// Datagram transport to a single collector
///
/// `send` and `recv` may be called concurrently from different threads.
pub trait Transport: Send + Sync {
    /// Send one datagram, returning the number of bytes written
    fn send(&self, frame: &[u8]) -> Result<usize>;

    /// Receive one datagram into `buffer`.
    ///
    /// Returns `Ok(None)` when the read timed out with nothing received.
    fn recv(&self, buffer: &mut [u8]) -> Result<Option<usize>>;
}

/// UDP transport bound to a local address and aimed at the collector
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    server: SocketAddr,
}

impl UdpTransport {
    /// Bind a socket on `bind_address` for talking to `server`
    ///
    /// The read timeout bounds every `recv`, so the listener can observe
    /// shutdown between reads.
    pub fn bind(bind_address: &str, server: SocketAddr, read_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(bind_address)?;
        socket.set_read_timeout(Some(read_timeout))?;
        log::info!(
            "UDP transport bound on {} (collector {})",
            socket.local_addr()?,
            server
        );
        Ok(Self { socket, server })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }
}

impl Transport for UdpTransport {
    fn send(&self, frame: &[u8]) -> Result<usize> {
        Ok(self.socket.send_to(frame, self.server)?)
    }

    fn recv(&self, buffer: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv_from(buffer) {
            Ok((bytes_received, sender)) => {
                if sender != self.server {
                    log::debug!("Datagram from {} (expected collector {})", sender, self.server);
                }
                Ok(Some(bytes_received))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
