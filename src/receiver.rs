use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::bridge::NetworkBridge;
use crate::shutdown::Shutdown;
use crate::transmitter::Transport;

/// Inbound Listener Daemon: socket -> `NetworkBridge::handle_inbound`
pub struct InboundListener<T: Transport> {
    bridge: Arc<NetworkBridge<T>>,
    shutdown: Shutdown,
    buffer_size: usize,
}

impl<T: Transport + 'static> InboundListener<T> {
    /// `buffer_size` is the expected status datagram size; one extra byte is
    /// read so oversized datagrams are seen (and rejected) at their real length.
    pub fn new(bridge: Arc<NetworkBridge<T>>, shutdown: Shutdown, buffer_size: usize) -> Self {
        Self {
            bridge,
            shutdown,
            buffer_size,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("inbound-listener".to_string())
            .spawn(move || self.run())
    }

    pub fn run(self) {
        log::info!("Inbound listener started");
        let mut buffer = vec![0u8; self.buffer_size + 1];

        while !self.shutdown.is_requested() {
            crate::run_guarded("inbound-listener", || self.poll_once(&mut buffer));
        }

        log::info!("Inbound listener stopped");
    }

    fn poll_once(&self, buffer: &mut [u8]) {
        match self.bridge.transport().recv(buffer) {
            Ok(Some(n)) => self.bridge.handle_inbound(&buffer[..n]),
            Ok(None) => {}
            Err(e) => {
                log::error!("Inbound receive failed: {}", e);
                // Avoid spinning on a persistently failing socket
                self.shutdown.wait_timeout(crate::DAEMON_ERROR_PAUSE);
            }
        }
    }
}
