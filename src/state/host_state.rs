use crate::config::ValidatorConfig;
use std::time::{Duration, Instant};

/// Tracks the state of a host during validation
///
/// Holds what the coordinator needs to enforce the per-host concurrency cap
/// and the politeness delay between request starts.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Fetches currently in flight against this host
    pub in_flight: u32,

    /// Number of fetches dispatched to this host in the current run
    pub request_count: u32,

    /// When the most recent fetch to this host was dispatched
    pub last_request_time: Option<Instant>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if a fetch can be dispatched to this host now
    ///
    /// This method enforces:
    /// - The per-host concurrency cap
    /// - The minimum delay between request starts to the same host
    pub fn can_request(&self, config: &ValidatorConfig, now: Instant) -> bool {
        if self.in_flight >= config.per_host_concurrency {
            return false;
        }

        self.time_until_next_request(config, now).is_none()
    }

    /// Records that a fetch was dispatched to this host
    pub fn record_dispatch(&mut self, now: Instant) {
        self.in_flight += 1;
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Records that a fetch against this host finished
    pub fn record_completion(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Calculates the time until the politeness delay allows another request
    ///
    /// Returns None if the delay has already elapsed. In-flight saturation is
    /// not reflected here since it clears on completion, not on a timer.
    pub fn time_until_next_request(
        &self,
        config: &ValidatorConfig,
        now: Instant,
    ) -> Option<Duration> {
        let last = self.last_request_time?;
        let min_delay = Duration::from_millis(config.politeness_delay_ms);
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }
}
