//! Session configuration.

use std::time::Duration;

use crate::RemoteError;

/// Time allowed to write a message to the peer.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed to read the next message (or pong) from the peer.
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);

/// Time allowed to establish the connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Depth of the command submission queue. Submitters block when it is full.
pub const DEFAULT_SUBMISSION_DEPTH: usize = 10;

/// Depth of the push-notification delivery queue.
pub const DEFAULT_DELIVERY_DEPTH: usize = 1000;

/// Depth of fan-out output queues.
pub const DEFAULT_STREAM_DEPTH: usize = 100;

/// Tunables for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub write_wait: Duration,
    pub pong_wait: Duration,
    /// Must be strictly shorter than `pong_wait`.
    pub ping_period: Duration,
    pub dial_timeout: Duration,
    pub submission_depth: usize,
    pub delivery_depth: usize,
    pub stream_depth: usize,
    /// Log every inbound and outbound message.
    pub debug: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            write_wait: DEFAULT_WRITE_WAIT,
            pong_wait: DEFAULT_PONG_WAIT,
            ping_period: ping_period_for(DEFAULT_PONG_WAIT),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            submission_depth: DEFAULT_SUBMISSION_DEPTH,
            delivery_depth: DEFAULT_DELIVERY_DEPTH,
            stream_depth: DEFAULT_STREAM_DEPTH,
            debug: false,
        }
    }
}

fn ping_period_for(pong_wait: Duration) -> Duration {
    pong_wait * 9 / 10
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_millis)
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl RemoteConfig {
    /// Defaults overridden by `RIPPLE_REMOTE_*` environment variables.
    ///
    /// - `RIPPLE_REMOTE_DEBUG`: enable message dumps
    /// - `RIPPLE_REMOTE_PONG_WAIT_MS`: read deadline (ping period follows at 9/10)
    /// - `RIPPLE_REMOTE_WRITE_WAIT_MS`: write deadline
    /// - `RIPPLE_REMOTE_DIAL_TIMEOUT_MS`: connect timeout
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(debug) = env_flag("RIPPLE_REMOTE_DEBUG") {
            config.debug = debug;
        }
        if let Some(pong_wait) = env_millis("RIPPLE_REMOTE_PONG_WAIT_MS") {
            config = config.with_pong_wait(pong_wait);
        }
        if let Some(write_wait) = env_millis("RIPPLE_REMOTE_WRITE_WAIT_MS") {
            config.write_wait = write_wait;
        }
        if let Some(dial_timeout) = env_millis("RIPPLE_REMOTE_DIAL_TIMEOUT_MS") {
            config.dial_timeout = dial_timeout;
        }
        config
    }

    /// Set the read deadline and derive the ping period from it.
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        self.pong_wait = pong_wait;
        self.ping_period = ping_period_for(pong_wait);
        self
    }

    pub fn with_write_wait(mut self, write_wait: Duration) -> Self {
        self.write_wait = write_wait;
        self
    }

    pub fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self
    }

    pub fn with_submission_depth(mut self, depth: usize) -> Self {
        self.submission_depth = depth;
        self
    }

    pub fn with_delivery_depth(mut self, depth: usize) -> Self {
        self.delivery_depth = depth;
        self
    }

    pub fn with_stream_depth(mut self, depth: usize) -> Self {
        self.stream_depth = depth;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> Result<(), RemoteError> {
        if self.ping_period.is_zero() || self.ping_period >= self.pong_wait {
            return Err(RemoteError::Config(format!(
                "ping period {:?} must be non-zero and shorter than pong wait {:?}",
                self.ping_period, self.pong_wait
            )));
        }
        if self.write_wait.is_zero() {
            return Err(RemoteError::Config("write wait must be non-zero".into()));
        }
        if self.submission_depth == 0 || self.delivery_depth == 0 || self.stream_depth == 0 {
            return Err(RemoteError::Config("queue depths must be non-zero".into()));
        }
        Ok(())
    }
}
