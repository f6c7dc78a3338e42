use crate::channel::LogicalChannel;
use crate::error::DiagError;
use crate::snapshot::{DiPoint, PhysicalSnapshot};

/// Controller capability used by the sequencer.
///
/// Reads return whatever the last [`refresh_points`](Self::refresh_points)
/// fetched; only refreshes and relay commands touch the device.
pub trait ControllerOperator {
    /// Fetch the latest point values from the device.
    fn refresh_points(&mut self) -> Result<(), DiagError>;

    /// Last refreshed logical DI state, `None` while unknown.
    fn read_logical_di(&self, channel: LogicalChannel) -> Option<bool>;

    fn set_relay(&mut self, channel: LogicalChannel, value: bool) -> Result<(), DiagError>;

    /// Physical-level DI access, when the controller provides it.
    fn di_interface(&self) -> Option<&dyn DiInterface> {
        None
    }
}

/// DI metadata and raw bit access backing wiring checks.
pub trait DiInterface {
    /// Per-channel state and physical annotation in the controller's own order.
    fn di_metadata(&self) -> Vec<(LogicalChannel, DiPoint)>;

    /// Raw discrete-input bits as of the last refresh.
    fn physical_snapshot(&self) -> PhysicalSnapshot;
}
