use core::fmt;
use core::ops::RangeInclusive;

/// Logical DI channels exercised when the controller reports no mapping.
pub const DI_CHANNELS: RangeInclusive<u16> = 0..=6;

/// Relay channels, tested in ascending order.
pub const RELAY_CHANNELS: RangeInclusive<u16> = 1..=6;

/// Channel number as exposed by the controller's high-level API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalChannel(pub u16);

/// Register bit index as wired on the device.
///
/// Firmware may remap wiring order, so this is discovered from the controller
/// and never derived from a [`LogicalChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalAddress(pub u16);

impl From<u16> for LogicalChannel {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<u16> for PhysicalAddress {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for LogicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
