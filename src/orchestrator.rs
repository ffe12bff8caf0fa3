//! Orchestrator - wires the queue, bridge and daemons and runs the
//! foreground sensor/pairing loop.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::bridge::NetworkBridge;
use crate::contracts::{DeviceIdentity, MotionEvent, PairingState};
use crate::drain::QueueDrain;
use crate::errors::{Error, Result};
use crate::queue::EventQueue;
use crate::receiver::InboundListener;
use crate::sensor::MotionSensor;
use crate::shutdown::Shutdown;
use crate::transmitter::Transport;

/// Longest single wait on the sensor, so shutdown is checked at least this often
const MOTION_POLL: Duration = Duration::from_secs(1);

/// Foreground loop tunables
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub queue_capacity: usize,
    pub no_motion_timeout: Duration,
    pub recv_buffer_size: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            queue_capacity: crate::DEFAULT_QUEUE_CAPACITY,
            no_motion_timeout: Duration::from_millis(crate::DEFAULT_NO_MOTION_TIMEOUT_MS),
            recv_buffer_size: crate::STATUS_DATAGRAM_LEN,
        }
    }
}

pub struct Orchestrator<T: Transport, S: MotionSensor> {
    identity: DeviceIdentity,
    queue: Arc<EventQueue>,
    bridge: Arc<NetworkBridge<T>>,
    sensor: S,
    shutdown: Shutdown,
    settings: OrchestratorSettings,
    daemons: Vec<JoinHandle<()>>,
}

impl<T: Transport + 'static, S: MotionSensor> Orchestrator<T, S> {
    /// Build the single event queue and take ownership of the bridge
    pub fn new(bridge: NetworkBridge<T>, sensor: S, shutdown: Shutdown, settings: OrchestratorSettings) -> Self {
        Self {
            identity: bridge.identity(),
            queue: Arc::new(EventQueue::new(settings.queue_capacity, shutdown.clone())),
            bridge: Arc::new(bridge),
            sensor,
            shutdown,
            settings,
            daemons: Vec::new(),
        }
    }

    pub fn bridge(&self) -> &Arc<NetworkBridge<T>> {
        &self.bridge
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn pairing_state(&self) -> PairingState {
        self.bridge.pairing_state()
    }

    /// Spawn the drain and listener daemons
    pub fn start_daemons(&mut self) -> Result<()> {
        log::info!("Starting daemons");
        let drain = QueueDrain::new(Arc::clone(&self.bridge), Arc::clone(&self.queue), self.shutdown.clone());
        self.daemons.push(drain.spawn()?);

        let listener = InboundListener::new(
            Arc::clone(&self.bridge),
            self.shutdown.clone(),
            self.settings.recv_buffer_size,
        );
        self.daemons.push(listener.spawn()?);
        Ok(())
    }

    /// Run until shutdown, then tear down
    ///
    /// Starts the daemons, pairs, and loops: one sensor lifecycle while
    /// paired, re-pair otherwise. Clean shutdown returns `Ok(())`.
    pub fn run(mut self) -> Result<()> {
        log::info!("Starting motion relay for device {}", self.identity.device_id);
        if let Err(e) = self.start_daemons() {
            self.terminate();
            return Err(e);
        }

        let outcome = self.foreground_loop();
        self.terminate();

        match outcome {
            Ok(()) | Err(Error::Shutdown) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn foreground_loop(&mut self) -> Result<()> {
        self.bridge.pair()?;
        log::info!("Motion relay ready");

        while !self.shutdown.is_requested() {
            if self.bridge.is_paired() {
                self.run_sensor_lifecycle()?;
            } else {
                log::info!("Lost pairing; re-pairing");
                self.bridge.pair()?;
            }
        }
        Ok(())
    }

    /// Wait for motion, enqueue one event, wait for motion to clear
    ///
    /// Returns early without an event when no motion arrives within one poll,
    /// so pairing and shutdown are rechecked.
    pub fn run_sensor_lifecycle(&mut self) -> Result<()> {
        if !self.sensor.wait_for_motion(MOTION_POLL)? {
            return Ok(());
        }

        log::info!("Motion detected");
        self.queue.put(MotionEvent::from_identity(&self.identity))?;

        if !self.sensor.wait_for_no_motion(self.settings.no_motion_timeout)? {
            log::debug!(
                "Motion still present after {:?}",
                self.settings.no_motion_timeout
            );
        }
        Ok(())
    }

    /// Flush the queue, stop the daemons and wait for them
    fn terminate(&mut self) {
        log::info!("Stopping motion relay");
        let dropped = self.queue.flush();
        if dropped > 0 {
            log::warn!("Discarded {} undelivered motion events", dropped);
        }
        self.shutdown.request();

        for handle in self.daemons.drain(..) {
            let name = handle.thread().name().unwrap_or("daemon").to_string();
            if handle.join().is_err() {
                log::error!("Daemon {} panicked", name);
            }
        }
        log::info!("Motion relay stopped");
    }
}
