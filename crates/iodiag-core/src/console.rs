use crate::channel::{LogicalChannel, PhysicalAddress};
use crate::error::DiagError;
use crate::report::{Phase, TestOutcome, Warning};

/// Operator answer to a failed DI check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Restart the whole DI phase from its first channel.
    Retry,
    /// Move on to the next channel.
    Skip,
    Quit,
}

/// Operator answer to a relay confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Quit,
}

/// Why the sequencer is asking for a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    InactiveTimeout { channel: LogicalChannel },
    ActiveTimeout { channel: LogicalChannel },
}

impl Failure {
    pub fn channel(&self) -> LogicalChannel {
        match self {
            Self::InactiveTimeout { channel } | Self::ActiveTimeout { channel } => *channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmRequest {
    RelayClosed { channel: LogicalChannel },
    RelayOpened { channel: LogicalChannel },
}

/// Progress reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PhaseStarted {
        phase: Phase,
        channels: Vec<LogicalChannel>,
    },
    PhaseRestarted {
        phase: Phase,
        restarts: u32,
    },
    /// The input must be left inactive.
    AwaitInactive { channel: LogicalChannel },
    /// The operator should apply the signal now.
    AwaitActive {
        channel: LogicalChannel,
        expected_address: Option<PhysicalAddress>,
    },
    /// Signal seen; the operator should release it.
    SignalDetected { channel: LogicalChannel },
    ChannelSkipped { channel: LogicalChannel },
    Warning(Warning),
    RelayClosing { channel: LogicalChannel },
    RelayOpening { channel: LogicalChannel },
    PhaseFinished { phase: Phase, outcome: TestOutcome },
}

/// Operator-facing side of a run. Every pause is reported through it.
pub trait OperatorConsole {
    fn notify(&mut self, event: &Event) -> Result<(), DiagError>;

    fn ask_decision(&mut self, failure: &Failure) -> Result<Decision, DiagError>;

    fn ask_confirmation(&mut self, request: &ConfirmRequest) -> Result<Confirmation, DiagError>;
}

fn is_quit(input: &str) -> bool {
    matches!(input, "q" | "quit" | "exit")
}

/// Parse an answer to a failure prompt. Anything unrecognised retries.
pub fn parse_decision(input: &str) -> Decision {
    let input = input.trim().to_ascii_lowercase();
    if is_quit(&input) {
        return Decision::Quit;
    }
    match input.as_str() {
        "s" | "skip" => Decision::Skip,
        _ => Decision::Retry,
    }
}

/// Parse an answer to a confirmation prompt. Anything but quit confirms.
pub fn parse_confirmation(input: &str) -> Confirmation {
    if is_quit(&input.trim().to_ascii_lowercase()) {
        Confirmation::Quit
    } else {
        Confirmation::Confirmed
    }
}
