//! motion-relay - edge client relaying PIR motion events to a collector
//!
//! Runs the foreground sensor/pairing loop on a blocking task and waits for
//! SIGINT/SIGTERM; on a signal the loop flushes the queue, stops its daemons
//! and exits 0.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use motion_relay::config::SensorKind;
use motion_relay::sensor::{GpioSensor, MotionSensor, SimulatedSensor};
use motion_relay::{Config, Error, NetworkBridge, Orchestrator, Result, Shutdown, UdpTransport};

#[derive(Debug, Parser)]
#[command(name = "motion-relay", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Collector address, overriding the config (host:port)
    #[arg(long)]
    server: Option<String>,

    #[arg(long)]
    device_id: Option<u8>,

    #[arg(long)]
    software_id: Option<u8>,

    /// Use the simulated motion sensor instead of GPIO
    #[arg(long)]
    simulate: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(server) = &self.server {
            let (host, port) = server
                .rsplit_once(':')
                .ok_or_else(|| Error::Config(format!("--server expects host:port, got {:?}", server)))?;
            config.server.host = host.to_string();
            config.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid port in --server {:?}", server)))?;
        }
        if let Some(id) = self.device_id {
            config.device.device_id = id;
        }
        if let Some(id) = self.software_id {
            config.device.software_id = id;
        }
        if self.simulate {
            config.sensor.kind = SensorKind::Simulated;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
        Ok(())
    }
}

fn open_sensor(config: &Config) -> Result<Box<dyn MotionSensor>> {
    match config.sensor.kind {
        SensorKind::Gpio => Ok(Box::new(GpioSensor::open(
            &config.sensor.gpio_root,
            config.sensor.gpio_pin,
            Duration::from_millis(config.sensor.poll_interval_ms),
        )?)),
        SensorKind::Simulated => Ok(Box::new(SimulatedSensor::new(config.simulated_mean_interval())?)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config)?;
    config.validate()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str()))
        .init();

    log::info!("motion-relay v{} starting", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Collector {}:{}, device {} (software {})",
        config.server.host,
        config.server.port,
        config.device.device_id,
        config.device.software_id
    );

    let shutdown = Shutdown::new();
    let transport = UdpTransport::bind(&config.network.bind_address, config.server_addr()?, config.read_timeout())?;
    let bridge = NetworkBridge::new(transport, config.identity(), config.retry_policy(), shutdown.clone())
        .with_pair_interval(config.pair_interval());
    let sensor = open_sensor(&config)?;
    let orchestrator = Orchestrator::new(bridge, sensor, shutdown.clone(), config.orchestrator_settings());

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let mut foreground = tokio::task::spawn_blocking(move || orchestrator.run());

        tokio::select! {
            outcome = &mut foreground => {
                return outcome.map_err(|e| Error::Other(format!("foreground loop aborted: {}", e)))?;
            }
            signal = shutdown_signal() => {
                signal?;
                log::info!("Received shutdown signal");
                shutdown.request();
            }
        }

        foreground
            .await
            .map_err(|e| Error::Other(format!("foreground loop aborted: {}", e)))?
    })?;

    log::info!("motion-relay exited cleanly");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
