//! Retry policy - chunked exponential backoff for reliable sends
//!
//! Attempts are grouped into chunks of `retries_per_chunk`. Failures inside a
//! chunk retry immediately; crossing into the next chunk first waits out the
//! current backoff, which then grows by `multiplier`. The wait therefore grows
//! per chunk, not per attempt.

use std::time::Duration;

use crate::shutdown::Shutdown;

/// Retry/backoff parameters for one `send_reliable` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per chunk
    pub retries_per_chunk: u32,

    /// Number of chunks before giving up
    pub max_chunks: u32,

    /// Wait before the second chunk
    pub base_backoff: Duration,

    /// Growth factor applied after every wait
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Total attempts a call makes before reporting failure
    pub fn total_attempts(&self) -> u32 {
        self.retries_per_chunk.saturating_mul(self.max_chunks)
    }

    /// Wait preceding chunk `chunk` (chunk 0 never waits)
    ///
    /// Formula: base * multiplier^(chunk - 1)
    pub fn backoff_for_chunk(&self, chunk: u32) -> Option<Duration> {
        if chunk == 0 {
            return None;
        }
        let factor = self.multiplier.powi(chunk as i32 - 1);
        Some(scale(self.base_backoff, factor))
    }

    /// All waits of an exhausted call, in order
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (1..self.max_chunks)
            .filter_map(|chunk| self.backoff_for_chunk(chunk))
            .collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries_per_chunk: crate::DEFAULT_RETRIES_PER_CHUNK,
            max_chunks: crate::DEFAULT_MAX_CHUNKS,
            base_backoff: Duration::from_millis(crate::DEFAULT_BASE_BACKOFF_MS),
            multiplier: crate::DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

/// Scale a duration at nanosecond resolution, rounding to the nearest nanosecond
fn scale(duration: Duration, factor: f64) -> Duration {
    Duration::from_nanos((duration.as_nanos() as f64 * factor).round() as u64)
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextStep {
    /// Retry straight away (same chunk)
    Retry,

    /// Wait this long, then retry (new chunk)
    Backoff(Duration),

    /// Every chunk used up
    Exhausted,
}

/// Per-call retry state. Never shared between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryContext {
    /// Number of the attempt in flight (0-based)
    pub attempt: u32,

    pub chunk_index: u32,

    pub position_in_chunk: u32,

    /// Wait applied at the next chunk boundary
    pub backoff: Duration,

    policy: RetryPolicy,
}

impl RetryContext {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            attempt: 0,
            chunk_index: 0,
            position_in_chunk: 0,
            backoff: policy.base_backoff,
            policy,
        }
    }

    /// Record a failure of the current attempt and advance to the next one
    pub fn on_failure(&mut self) -> NextStep {
        let next = self.attempt + 1;
        if next >= self.policy.total_attempts() {
            return NextStep::Exhausted;
        }

        self.attempt = next;
        self.chunk_index = next / self.policy.retries_per_chunk;
        self.position_in_chunk = next % self.policy.retries_per_chunk;

        if self.position_in_chunk == 0 {
            let wait = self.backoff;
            self.backoff = scale(self.backoff, self.policy.multiplier);
            NextStep::Backoff(wait)
        } else {
            NextStep::Retry
        }
    }

    /// Attempts made so far, counting the current one
    pub fn attempts_made(&self) -> u32 {
        self.attempt + 1
    }
}

/// Something that can wait out a backoff
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Backoff waits end early when shutdown is requested
impl Sleeper for Shutdown {
    fn sleep(&self, duration: Duration) {
        self.wait_timeout(duration);
    }
}

/// Plain thread sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
