use iodiag_core::{
    ConfirmRequest, Confirmation, Decision, DiagError, Event, Failure, OperatorConsole, Phase,
    TestOutcome, parse_confirmation, parse_decision,
};
use std::io::{BufRead, Write};

/// Line-oriented operator console. End of input is treated as quit.
pub struct LineConsole<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn prompt(&mut self, text: &str) -> Result<Option<String>, DiagError> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl<R: BufRead, W: Write> OperatorConsole for LineConsole<R, W> {
    fn notify(&mut self, event: &Event) -> Result<(), DiagError> {
        let out = &mut self.output;
        match event {
            Event::PhaseStarted {
                phase: Phase::DiscreteInputs,
                channels,
            } => {
                let order: Vec<String> = channels.iter().map(|ch| format!("DI{ch}")).collect();
                writeln!(out, "DI test: apply a signal to each input in turn ({}).", order.join(", "))?;
            }
            Event::PhaseStarted {
                phase: Phase::Relays,
                channels,
            } => {
                writeln!(out, "Relay test: switching {} relays one at a time.", channels.len())?;
            }
            Event::PhaseRestarted { phase, restarts } => {
                writeln!(out, "\nRestarting {phase} test (attempt {}).", restarts + 1)?;
            }
            Event::AwaitInactive { channel } => {
                writeln!(out, "\nDI{channel}: make sure the input is inactive.")?;
            }
            Event::AwaitActive {
                channel,
                expected_address,
            } => match expected_address {
                Some(address) => writeln!(
                    out,
                    "DI{channel}: apply the signal (expected at input address {address})."
                )?,
                None => writeln!(out, "DI{channel}: apply the signal.")?,
            },
            Event::SignalDetected { channel } => {
                writeln!(out, "DI{channel}: signal detected, release it.")?;
            }
            Event::ChannelSkipped { channel } => writeln!(out, "DI{channel}: skipped.")?,
            Event::Warning(warning) => writeln!(out, "WARNING: {warning}")?,
            Event::RelayClosing { channel } => {
                writeln!(out, "\nRelay {channel}: switching on (contact should close).")?;
            }
            Event::RelayOpening { channel } => {
                writeln!(out, "Relay {channel}: switching off (contact should open).")?;
            }
            Event::PhaseFinished { phase, outcome } => match outcome {
                TestOutcome::Completed => writeln!(out, "{phase} test finished.")?,
                TestOutcome::Aborted => writeln!(out, "{phase} test aborted.")?,
            },
        }
        Ok(())
    }

    fn ask_decision(&mut self, failure: &Failure) -> Result<Decision, DiagError> {
        let text = match failure {
            Failure::InactiveTimeout { channel } => {
                format!("DI{channel} is still active. (r)etry/(s)kip/(q)uit: ")
            }
            Failure::ActiveTimeout { channel } => {
                format!("DI{channel}: no signal seen. (r)etry/(s)kip/(q)uit: ")
            }
        };
        Ok(self
            .prompt(&text)?
            .map_or(Decision::Quit, |line| parse_decision(&line)))
    }

    fn ask_confirmation(&mut self, request: &ConfirmRequest) -> Result<Confirmation, DiagError> {
        let text = match request {
            ConfirmRequest::RelayClosed { channel } => {
                format!("Relay {channel} closed? Enter to continue, q to quit: ")
            }
            ConfirmRequest::RelayOpened { channel } => {
                format!("Relay {channel} open? Enter to continue, q to quit: ")
            }
        };
        Ok(self
            .prompt(&text)?
            .map_or(Confirmation::Quit, |line| parse_confirmation(&line)))
    }
}
