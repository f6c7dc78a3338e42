use crate::DriverError;
use iodiag_core::{LogicalChannel, PhysicalAddress};

/// Register layout of a supported controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerModel {
    pub name: &'static str,
    /// Discrete-input address of each DI, indexed by logical channel.
    pub input_addresses: &'static [u16],
    /// Coil address of each relay, indexed by relay channel minus one.
    pub relay_coils: &'static [u16],
    /// First discrete input and count read by one refresh.
    pub input_block: (u16, u16),
}

// Input 0 is reported after the six numbered inputs, at discrete input 7.
const WB_MR6_INPUTS: &[u16] = &[7, 0, 1, 2, 3, 4, 5];
const SIX_RELAY_COILS: &[u16] = &[0, 1, 2, 3, 4, 5];

pub const MODELS: &[ControllerModel] = &[
    ControllerModel {
        name: "wb_mr6lv",
        input_addresses: WB_MR6_INPUTS,
        relay_coils: SIX_RELAY_COILS,
        input_block: (0, 8),
    },
    ControllerModel {
        name: "wb_mr6c",
        input_addresses: WB_MR6_INPUTS,
        relay_coils: SIX_RELAY_COILS,
        input_block: (0, 8),
    },
    ControllerModel {
        name: "generic_di7_r6",
        input_addresses: &[0, 1, 2, 3, 4, 5, 6],
        relay_coils: SIX_RELAY_COILS,
        input_block: (0, 7),
    },
];

impl ControllerModel {
    /// Case-insensitive lookup; `-` and `_` are interchangeable.
    pub fn lookup(name: &str) -> Result<&'static ControllerModel, DriverError> {
        let wanted = name.trim().to_ascii_lowercase().replace('-', "_");
        MODELS
            .iter()
            .find(|model| model.name == wanted)
            .ok_or_else(|| DriverError::UnknownModel(name.to_string()))
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        MODELS.iter().map(|model| model.name)
    }

    pub fn physical_address(&self, channel: LogicalChannel) -> Option<PhysicalAddress> {
        self.input_addresses
            .get(usize::from(channel.0))
            .copied()
            .map(PhysicalAddress)
    }

    pub fn relay_coil(&self, channel: LogicalChannel) -> Option<u16> {
        let index = usize::from(channel.0.checked_sub(1)?);
        self.relay_coils.get(index).copied()
    }

    /// Logical DIs with their physical address, in logical order.
    pub fn inputs(&self) -> impl Iterator<Item = (LogicalChannel, PhysicalAddress)> + '_ {
        self.input_addresses
            .iter()
            .enumerate()
            .filter_map(|(idx, address)| {
                let channel = u16::try_from(idx).ok()?;
                Some((LogicalChannel(channel), PhysicalAddress(*address)))
            })
    }
}
