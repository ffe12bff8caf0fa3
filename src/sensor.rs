//! Motion sensor collaborators
//!
//! The relay only needs two blocking calls from the hardware: wait for motion
//! and wait for motion to clear. Both take a timeout so the foreground loop
//! can notice shutdown between waits.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::errors::{Error, Result};

/// Source of discrete "motion started / motion ended" edges
pub trait MotionSensor: Send {
    /// Block until motion is detected (`true`) or `timeout` elapses (`false`)
    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool>;

    /// Block until motion clears (`true`) or `timeout` elapses (`false`)
    fn wait_for_no_motion(&mut self, timeout: Duration) -> Result<bool>;
}

impl<S: MotionSensor + ?Sized> MotionSensor for Box<S> {
    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool> {
        (**self).wait_for_motion(timeout)
    }

    fn wait_for_no_motion(&mut self, timeout: Duration) -> Result<bool> {
        (**self).wait_for_no_motion(timeout)
    }
}

/// PIR sensor on a Linux sysfs GPIO line (`1` = motion)
#[derive(Debug)]
pub struct GpioSensor {
    value_path: PathBuf,
    poll_interval: Duration,
}

impl GpioSensor {
    /// Open `gpio<pin>` under `gpio_root`, exporting it as an input if needed
    pub fn open(gpio_root: &Path, pin: u32, poll_interval: Duration) -> Result<Self> {
        let line = gpio_root.join(format!("gpio{}", pin));
        if !line.exists() {
            log::info!("Exporting GPIO {}", pin);
            fs::write(gpio_root.join("export"), pin.to_string())
                .map_err(|e| Error::Sensor(format!("failed to export GPIO {}: {}", pin, e)))?;
        }

        let direction = line.join("direction");
        if direction.exists() {
            fs::write(&direction, "in")
                .map_err(|e| Error::Sensor(format!("failed to set GPIO {} as input: {}", pin, e)))?;
        }

        let value_path = line.join("value");
        if !value_path.exists() {
            return Err(Error::Sensor(format!(
                "GPIO value file missing: {}",
                value_path.display()
            )));
        }

        Ok(Self {
            value_path,
            poll_interval,
        })
    }

    fn read_level(&self) -> Result<bool> {
        let raw = fs::read_to_string(&self.value_path)?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(Error::Sensor(format!("unexpected GPIO value {:?}", other))),
        }
    }

    /// Poll until the line reads `level` or the timeout passes
    fn wait_for_level(&self, level: bool, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.read_level()? == level {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

impl MotionSensor for GpioSensor {
    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool> {
        self.wait_for_level(true, timeout)
    }

    fn wait_for_no_motion(&mut self, timeout: Duration) -> Result<bool> {
        self.wait_for_level(false, timeout)
    }
}

/// Random motion for machines without the PIR hardware
///
/// Gaps between motion edges are exponentially distributed around
/// `mean_interval`; each motion lasts between half a second and two seconds.
pub struct SimulatedSensor {
    gaps: Exp<f64>,
    next_motion: Instant,
    motion_ends: Option<Instant>,
}

impl SimulatedSensor {
    pub fn new(mean_interval: Duration) -> Result<Self> {
        let rate = 1.0 / mean_interval.as_secs_f64().max(f64::EPSILON);
        let gaps = Exp::new(rate).map_err(|e| Error::Sensor(format!("bad mean interval: {}", e)))?;
        let mut sensor = Self {
            gaps,
            next_motion: Instant::now(),
            motion_ends: None,
        };
        sensor.schedule_next();
        Ok(sensor)
    }

    fn schedule_next(&mut self) {
        let gap = self.gaps.sample(&mut rand::thread_rng());
        self.next_motion = Instant::now() + Duration::from_secs_f64(gap);
    }
}

impl MotionSensor for SimulatedSensor {
    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool> {
        let now = Instant::now();
        if self.next_motion > now + timeout {
            thread::sleep(timeout);
            return Ok(false);
        }

        thread::sleep(self.next_motion.saturating_duration_since(now));
        let hold = rand::thread_rng().gen_range(500..=2000);
        self.motion_ends = Some(Instant::now() + Duration::from_millis(hold));
        log::debug!("Simulated motion for {} ms", hold);
        Ok(true)
    }

    fn wait_for_no_motion(&mut self, timeout: Duration) -> Result<bool> {
        let now = Instant::now();
        let ends = self.motion_ends.unwrap_or(now);
        if ends > now + timeout {
            thread::sleep(timeout);
            return Ok(false);
        }

        thread::sleep(ends.saturating_duration_since(now));
        self.motion_ends = None;
        self.schedule_next();
        Ok(true)
    }
}

/// Replays a fixed number of motion edges, then reports no motion
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    remaining: usize,
    idle_wait: Duration,
}

impl ScriptedSensor {
    pub fn new(motions: usize) -> Self {
        Self {
            remaining: motions,
            idle_wait: Duration::from_millis(10),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl MotionSensor for ScriptedSensor {
    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool> {
        if self.remaining == 0 {
            thread::sleep(self.idle_wait.min(timeout));
            return Ok(false);
        }
        self.remaining -= 1;
        Ok(true)
    }

    fn wait_for_no_motion(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_gpio(level: &str) -> (tempfile::TempDir, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let line = root.path().join("gpio4");
        fs::create_dir(&line).unwrap();
        fs::write(line.join("direction"), "out").unwrap();
        fs::write(line.join("value"), level).unwrap();
        let value = line.join("value");
        (root, value)
    }

    #[test]
    fn test_gpio_reads_levels() {
        let (root, value) = fake_gpio("0\n");
        let mut sensor = GpioSensor::open(root.path(), 4, Duration::from_millis(1)).unwrap();

        assert!(!sensor.wait_for_motion(Duration::from_millis(10)).unwrap());
        assert!(sensor.wait_for_no_motion(Duration::from_millis(10)).unwrap());

        fs::write(&value, "1\n").unwrap();
        assert!(sensor.wait_for_motion(Duration::from_millis(10)).unwrap());

        let direction = fs::read_to_string(root.path().join("gpio4/direction")).unwrap();
        assert_eq!(direction, "in");
    }

    #[test]
    fn test_gpio_rejects_garbage() {
        let (root, _) = fake_gpio("x");
        let mut sensor = GpioSensor::open(root.path(), 4, Duration::from_millis(1)).unwrap();
        assert!(matches!(
            sensor.wait_for_motion(Duration::from_millis(5)),
            Err(Error::Sensor(_))
        ));
    }

    #[test]
    fn test_gpio_missing_line() {
        let root = tempfile::tempdir().unwrap();
        // Export "succeeds" into a plain file, but no line directory appears
        let err = GpioSensor::open(root.path(), 17, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, Error::Sensor(_)));
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "17");
    }

    #[test]
    fn test_scripted_sensor() {
        let mut sensor = ScriptedSensor::new(2);
        assert!(sensor.wait_for_motion(Duration::from_secs(1)).unwrap());
        assert!(sensor.wait_for_motion(Duration::from_secs(1)).unwrap());
        assert!(!sensor.wait_for_motion(Duration::from_millis(1)).unwrap());
        assert_eq!(sensor.remaining(), 0);
    }

    #[test]
    fn test_simulated_sensor_times_out() {
        let mut sensor = SimulatedSensor::new(Duration::from_secs(3600)).unwrap();
        // With an hour-long mean gap, a short wait almost surely sees nothing;
        // either way the call must return within the timeout bound
        let start = Instant::now();
        let moved = sensor.wait_for_motion(Duration::from_millis(20)).unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        if !moved {
            assert!(sensor.wait_for_no_motion(Duration::from_millis(20)).unwrap());
        }
    }
}
