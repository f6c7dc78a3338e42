//! Polling and sequencing engine for interactive controller wiring diagnostics.
//!
//! `iodiag-core` drives an operator through discrete-input and relay checks
//! on a polled controller. It never talks to hardware itself: controller
//! access goes through [`ControllerOperator`] and [`DiInterface`], operator
//! interaction through [`OperatorConsole`].

#![forbid(unsafe_code)]

pub mod channel;
pub mod console;
pub mod detector;
pub mod error;
pub mod mapping;
pub mod operator;
pub mod report;
pub mod sampler;
pub mod sequencer;
pub mod snapshot;

pub use channel::{DI_CHANNELS, LogicalChannel, PhysicalAddress, RELAY_CHANNELS};
pub use console::{
    ConfirmRequest, Confirmation, Decision, Event, Failure, OperatorConsole, parse_confirmation,
    parse_decision,
};
pub use detector::{PhysicalChangeDetector, PhysicalRise, describe_changes};
pub use error::{BoxError, DiagError};
pub use mapping::{ChannelMapping, DroppedEntry, MappingEntry, resolve_mapping};
pub use operator::{ControllerOperator, DiInterface};
pub use report::{Phase, PhaseReport, RunMode, RunReport, TestOutcome, Warning};
pub use sampler::{DEFAULT_POLL_INTERVAL, StateSampler};
pub use sequencer::{DiagnosticSequencer, SequencerConfig};
pub use snapshot::{DiPoint, LogicalSnapshot, PhysicalSnapshot};
