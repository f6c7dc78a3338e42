use crate::channel::{LogicalChannel, PhysicalAddress};
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    DiscreteInputs,
    Relays,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiscreteInputs => f.write_str("DI"),
            Self::Relays => f.write_str("relay"),
        }
    }
}

/// Which phases a run executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Full,
    DiOnly,
    RelaysOnly,
}

impl RunMode {
    pub fn includes(self, phase: Phase) -> bool {
        match (self, phase) {
            (Self::Full, _) => true,
            (Self::DiOnly, Phase::DiscreteInputs) => true,
            (Self::RelaysOnly, Phase::Relays) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Completed,
    Aborted,
}

/// Non-fatal findings. None of them fails a channel on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Two metadata entries claimed the same physical address (or channel);
    /// `dropped` is not tested.
    DuplicateMapping {
        kept_channel: LogicalChannel,
        kept_address: PhysicalAddress,
        dropped_channel: LogicalChannel,
        dropped_address: PhysicalAddress,
    },
    /// More than one physical input rose while one channel was under test.
    AmbiguousRise {
        channel: LogicalChannel,
        addresses: Vec<PhysicalAddress>,
        changes: Vec<String>,
    },
    /// The rising input is not the one mapped to the channel under test.
    PhysicalMismatch {
        channel: LogicalChannel,
        expected: PhysicalAddress,
        observed: PhysicalAddress,
        /// Channel mapped to `observed`, if any.
        observed_channel: Option<LogicalChannel>,
        changes: Vec<String>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateMapping {
                kept_channel,
                kept_address,
                dropped_channel,
                dropped_address,
            } => write!(
                f,
                "DI{dropped_channel} (address {dropped_address}) dropped from mapping, \
                 conflicts with DI{kept_channel} (address {kept_address})"
            ),
            Self::AmbiguousRise {
                channel,
                addresses,
                changes,
            } => {
                let addresses: Vec<String> = addresses.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "DI{channel}: several inputs rose at once (addresses {}); changes [{}]",
                    addresses.join(", "),
                    changes.join(", ")
                )
            }
            Self::PhysicalMismatch {
                channel,
                expected,
                observed,
                observed_channel,
                changes,
            } => {
                write!(
                    f,
                    "DI{channel}: expected input at address {expected}, signal seen at address {observed}"
                )?;
                if let Some(other) = observed_channel {
                    write!(f, " (mapped to DI{other})")?;
                }
                write!(f, "; changes [{}]", changes.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub outcome: TestOutcome,
    /// Channels that passed in the final pass over the phase.
    pub passed: Vec<LogicalChannel>,
    pub skipped: Vec<LogicalChannel>,
    /// Warnings from every pass, including restarted ones.
    pub warnings: Vec<Warning>,
    pub restarts: u32,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            outcome: TestOutcome::Aborted,
            passed: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
            restarts: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == TestOutcome::Completed
    }
}

/// Reports of the phases a run actually executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub discrete_inputs: Option<PhaseReport>,
    pub relays: Option<PhaseReport>,
}

impl RunReport {
    pub fn phases(&self) -> impl Iterator<Item = &PhaseReport> {
        self.discrete_inputs.iter().chain(self.relays.iter())
    }

    /// True when every executed phase completed.
    pub fn is_completed(&self) -> bool {
        self.phases().all(PhaseReport::is_completed)
    }

    /// Process status: 0 on completion, 1 if a phase was aborted.
    pub fn exit_code(&self) -> u8 {
        if self.is_completed() { 0 } else { 1 }
    }
}
