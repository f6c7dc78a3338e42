use crate::channel::PhysicalAddress;
use crate::error::DiagError;
use crate::operator::ControllerOperator;
use crate::sampler::DEFAULT_POLL_INTERVAL;
use crate::snapshot::PhysicalSnapshot;
use std::collections::BTreeSet;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of watching the physical inputs for a rising bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalRise {
    /// Exactly one address went from `false` to `true`.
    Single(PhysicalAddress),
    /// Several addresses rose within the same sample; the signal cannot be attributed.
    Multiple(Vec<PhysicalAddress>),
    /// Nothing rose before the deadline.
    None,
}

impl PhysicalRise {
    /// Classify the rising set between `baseline` and `current`.
    pub fn between(baseline: &PhysicalSnapshot, current: &PhysicalSnapshot) -> Self {
        let mut rises = current.rises_since(baseline);
        match rises.len() {
            0 => Self::None,
            1 => Self::Single(rises.remove(0)),
            _ => Self::Multiple(rises),
        }
    }
}

/// Watches raw discrete-input bits to catch transposed wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalChangeDetector {
    poll_interval: Duration,
}

impl Default for PhysicalChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PhysicalChangeDetector {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Poll until at least one bit rises relative to `baseline`, or `timeout` elapses.
    ///
    /// Returns [`PhysicalRise::None`] right away when the operator has no
    /// [`DiInterface`](crate::operator::DiInterface).
    pub fn wait_for_physical_rise<O>(
        &self,
        operator: &mut O,
        baseline: &PhysicalSnapshot,
        timeout: Duration,
    ) -> Result<PhysicalRise, DiagError>
    where
        O: ControllerOperator + ?Sized,
    {
        if operator.di_interface().is_none() {
            return Ok(PhysicalRise::None);
        }

        let start = Instant::now();
        while start.elapsed() < timeout {
            operator.refresh_points()?;
            let Some(current) = operator.di_interface().map(|di| di.physical_snapshot()) else {
                return Ok(PhysicalRise::None);
            };

            let rise = PhysicalRise::between(baseline, &current);
            if rise != PhysicalRise::None {
                debug!(?rise, "physical input rise observed");
                return Ok(rise);
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            sleep(self.poll_interval.min(remaining));
        }

        debug!(?timeout, "no physical input rise before timeout");
        Ok(PhysicalRise::None)
    }
}

/// `addr:prev->curr` entries for every address whose value differs.
///
/// Values render as `0`/`1`; an address missing from one side renders as `?`.
pub fn describe_changes(before: &PhysicalSnapshot, after: &PhysicalSnapshot) -> Vec<String> {
    let addresses: BTreeSet<PhysicalAddress> = before
        .iter()
        .chain(after.iter())
        .map(|(address, _)| address)
        .collect();

    addresses
        .into_iter()
        .filter_map(|address| {
            let prev = before.get(address);
            let curr = after.get(address);
            (prev != curr).then(|| format!("{address}:{}->{}", render(prev), render(curr)))
        })
        .collect()
}

fn render(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "1",
        Some(false) => "0",
        None => "?",
    }
}
