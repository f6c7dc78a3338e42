use crate::channel::{LogicalChannel, PhysicalAddress};
use std::collections::BTreeMap;

/// Per-channel entry of the DI metadata reported by a controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiPoint {
    /// `None` until the controller has reported a value.
    pub state: Option<bool>,
    /// `None` when the controller does not remap; identity is assumed.
    pub physical_address: Option<PhysicalAddress>,
}

impl DiPoint {
    pub fn new(state: Option<bool>, physical_address: Option<PhysicalAddress>) -> Self {
        Self {
            state,
            physical_address,
        }
    }
}

/// Tri-state logical values keyed by channel.
pub type LogicalSnapshot = BTreeMap<LogicalChannel, Option<bool>>;

pub fn logical_snapshot<'a, I>(metadata: I) -> LogicalSnapshot
where
    I: IntoIterator<Item = &'a (LogicalChannel, DiPoint)>,
{
    metadata
        .into_iter()
        .map(|(channel, point)| (*channel, point.state))
        .collect()
}

/// Raw register bits from a single underlying read, keyed by physical address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalSnapshot {
    bits: BTreeMap<PhysicalAddress, bool>,
}

impl PhysicalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn get(&self, address: PhysicalAddress) -> Option<bool> {
        self.bits.get(&address).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PhysicalAddress, bool)> + '_ {
        self.bits.iter().map(|(address, value)| (*address, *value))
    }

    /// Addresses that were `false` in `baseline` and are `true` now.
    ///
    /// Addresses missing from the baseline never count as a rise.
    pub fn rises_since(&self, baseline: &PhysicalSnapshot) -> Vec<PhysicalAddress> {
        self.iter()
            .filter(|(address, value)| *value && baseline.get(*address) == Some(false))
            .map(|(address, _)| address)
            .collect()
    }
}

impl FromIterator<(PhysicalAddress, bool)> for PhysicalSnapshot {
    fn from_iter<T: IntoIterator<Item = (PhysicalAddress, bool)>>(iter: T) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}
