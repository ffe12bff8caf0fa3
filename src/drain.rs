//! Queue Drain Daemon
//!
//! Takes events off the queue in FIFO order and forwards each through the
//! bridge. A failed event is logged and dropped: `send_reliable` already
//! retried it, and the orchestrator re-pairs once the bridge reports
//! `Unpaired`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::bridge::NetworkBridge;
use crate::errors::Error;
use crate::queue::EventQueue;
use crate::shutdown::Shutdown;
use crate::transmitter::Transport;

pub struct QueueDrain<T: Transport> {
    bridge: Arc<NetworkBridge<T>>,
    queue: Arc<EventQueue>,
    shutdown: Shutdown,
}

impl<T: Transport + 'static> QueueDrain<T> {
    pub fn new(bridge: Arc<NetworkBridge<T>>, queue: Arc<EventQueue>, shutdown: Shutdown) -> Self {
        Self {
            bridge,
            queue,
            shutdown,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("queue-drain".to_string())
            .spawn(move || self.run())
    }

    pub fn run(self) {
        log::info!("Queue drain started");

        while !self.shutdown.is_requested() {
            let Some(event) = self.queue.take() else {
                break;
            };

            crate::run_guarded("queue-drain", || {
                match self.bridge.send_reliable(event.payload()) {
                    Ok(()) => log::debug!("Motion event delivered"),
                    Err(Error::Shutdown) => log::info!("Motion event abandoned on shutdown"),
                    Err(e) => log::warn!("Motion event dropped: {}", e),
                }
            });
        }

        log::info!("Queue drain stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack_manager::RetryPolicy;
    use crate::contracts::{DeviceIdentity, MotionEvent};
    use crate::errors::Result;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recording(Mutex<Vec<Vec<u8>>>);

    impl Transport for Recording {
        fn send(&self, frame: &[u8]) -> Result<usize> {
            self.0.lock().unwrap().push(frame.to_vec());
            Ok(frame.len())
        }

        fn recv(&self, _buffer: &mut [u8]) -> Result<Option<usize>> {
            Ok(None)
        }
    }

    #[test]
    fn test_drains_in_order_and_stops() {
        let shutdown = Shutdown::new();
        let queue = Arc::new(EventQueue::new(20, shutdown.clone()));
        let bridge = Arc::new(NetworkBridge::new(
            Recording::default(),
            DeviceIdentity::new(4, 4),
            RetryPolicy::default(),
            shutdown.clone(),
        ));

        for id in 1..=3 {
            queue.put(MotionEvent::new(vec![id])).unwrap();
        }

        let handle = QueueDrain::new(Arc::clone(&bridge), Arc::clone(&queue), shutdown.clone())
            .spawn()
            .unwrap();

        let start = Instant::now();
        while bridge.transport().0.lock().unwrap().len() < 3 && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }

        shutdown.request();
        handle.join().unwrap();

        assert_eq!(
            *bridge.transport().0.lock().unwrap(),
            vec![vec![2, 1, 1], vec![2, 1, 2], vec![2, 1, 3]]
        );
    }
}
