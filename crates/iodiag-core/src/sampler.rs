use crate::channel::LogicalChannel;
use crate::error::DiagError;
use crate::operator::ControllerOperator;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::debug;

/// Delay between two polls of the controller.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Bounded wait for a logical DI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSampler {
    poll_interval: Duration,
}

impl Default for StateSampler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl StateSampler {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Refresh and sample `channel` until it reads `expected` or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout. An unknown value never matches. The
    /// deadline is measured from entry on a monotonic clock, so slow refreshes
    /// shrink the observation window instead of extending it.
    pub fn wait_for_logical_state<O>(
        &self,
        operator: &mut O,
        channel: LogicalChannel,
        expected: bool,
        timeout: Duration,
    ) -> Result<bool, DiagError>
    where
        O: ControllerOperator + ?Sized,
    {
        let start = Instant::now();
        let mut polls = 0u32;

        while start.elapsed() < timeout {
            operator.refresh_points()?;
            polls += 1;
            if operator.read_logical_di(channel) == Some(expected) {
                debug!(channel = channel.0, expected, polls, "logical state reached");
                return Ok(true);
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            sleep(self.poll_interval.min(remaining));
        }

        debug!(
            channel = channel.0,
            expected,
            polls,
            ?timeout,
            "timed out waiting for logical state"
        );
        Ok(false)
    }
}
