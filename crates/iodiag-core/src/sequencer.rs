use crate::channel::{DI_CHANNELS, LogicalChannel, RELAY_CHANNELS};
use crate::console::{ConfirmRequest, Confirmation, Decision, Event, Failure, OperatorConsole};
use crate::detector::{PhysicalChangeDetector, PhysicalRise, describe_changes};
use crate::error::DiagError;
use crate::mapping::{ChannelMapping, resolve_mapping};
use crate::operator::ControllerOperator;
use crate::report::{Phase, PhaseReport, RunMode, RunReport, TestOutcome, Warning};
use crate::sampler::{DEFAULT_POLL_INTERVAL, StateSampler};
use crate::snapshot::{PhysicalSnapshot, logical_snapshot};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Deadline for every bounded wait.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SequencerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

enum ChannelStep {
    Passed,
    Skipped,
    RestartPhase,
    Quit,
}

impl From<Decision> for ChannelStep {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Retry => Self::RestartPhase,
            Decision::Skip => Self::Skipped,
            Decision::Quit => Self::Quit,
        }
    }
}

/// Runs the DI and relay test phases against one controller.
pub struct DiagnosticSequencer<'a, O: ?Sized, C: ?Sized> {
    operator: &'a mut O,
    console: &'a mut C,
    config: SequencerConfig,
    sampler: StateSampler,
    detector: PhysicalChangeDetector,
}

impl<'a, O, C> DiagnosticSequencer<'a, O, C>
where
    O: ControllerOperator + ?Sized,
    C: OperatorConsole + ?Sized,
{
    pub fn new(operator: &'a mut O, console: &'a mut C, config: SequencerConfig) -> Self {
        Self {
            operator,
            console,
            config,
            sampler: StateSampler::new(config.poll_interval),
            detector: PhysicalChangeDetector::new(config.poll_interval),
        }
    }

    /// DI phase, then the relay phase only if the DI phase was not aborted.
    pub fn run(&mut self, mode: RunMode) -> Result<RunReport, DiagError> {
        let mut run = RunReport::default();

        if mode.includes(Phase::DiscreteInputs) {
            let report = self.run_di_phase()?;
            let completed = report.is_completed();
            run.discrete_inputs = Some(report);
            if !completed {
                return Ok(run);
            }
        }
        if mode.includes(Phase::Relays) {
            run.relays = Some(self.run_relay_phase()?);
        }
        Ok(run)
    }

    /// Walk every DI channel through inactive, active and release checks.
    ///
    /// A Retry answer at either failure prompt restarts the phase from its
    /// first channel, not the failing one. Skip only advances one channel.
    pub fn run_di_phase(&mut self) -> Result<PhaseReport, DiagError> {
        let phase = Phase::DiscreteInputs;
        let mapping = resolve_mapping(self.operator.di_interface());
        let channels: Vec<LogicalChannel> = if mapping.is_empty() {
            DI_CHANNELS.map(LogicalChannel).collect()
        } else {
            mapping.logical_channels().collect()
        };
        let mut report = PhaseReport::new(phase);

        info!(
            channels = channels.len(),
            mapped = !mapping.is_empty(),
            "starting DI phase"
        );
        self.console.notify(&Event::PhaseStarted {
            phase,
            channels: channels.clone(),
        })?;

        for dropped in mapping.dropped() {
            let warning = Warning::DuplicateMapping {
                kept_channel: dropped.kept.logical,
                kept_address: dropped.kept.physical,
                dropped_channel: dropped.entry.logical,
                dropped_address: dropped.entry.physical,
            };
            self.record_warning(&mut report, warning)?;
        }

        'phase: loop {
            report.passed.clear();
            report.skipped.clear();

            for &channel in &channels {
                match self.test_input(channel, &mapping, &mut report)? {
                    ChannelStep::Passed => report.passed.push(channel),
                    ChannelStep::Skipped => {
                        self.console.notify(&Event::ChannelSkipped { channel })?;
                        report.skipped.push(channel);
                    }
                    ChannelStep::RestartPhase => {
                        report.restarts += 1;
                        info!(channel = channel.0, restarts = report.restarts, "restarting DI phase");
                        self.console.notify(&Event::PhaseRestarted {
                            phase,
                            restarts: report.restarts,
                        })?;
                        continue 'phase;
                    }
                    ChannelStep::Quit => return self.finish(report, TestOutcome::Aborted),
                }
            }
            break;
        }

        self.finish(report, TestOutcome::Completed)
    }

    fn test_input(
        &mut self,
        channel: LogicalChannel,
        mapping: &ChannelMapping,
        report: &mut PhaseReport,
    ) -> Result<ChannelStep, DiagError> {
        let timeout = self.config.timeout;

        self.console.notify(&Event::AwaitInactive { channel })?;
        if !self
            .sampler
            .wait_for_logical_state(&mut *self.operator, channel, false, timeout)?
        {
            info!(channel = channel.0, "inactive level not observed");
            return self.decide(Failure::InactiveTimeout { channel });
        }

        let expected_address = mapping.expected_physical(channel);
        let baseline = self.capture_baseline(channel);

        self.console.notify(&Event::AwaitActive {
            channel,
            expected_address,
        })?;
        // The rise detector and the active check share one deadline.
        let started = Instant::now();
        if let (Some(baseline), Some(expected)) = (baseline, expected_address) {
            let rise = self
                .detector
                .wait_for_physical_rise(&mut *self.operator, &baseline, timeout)?;
            let changes = self.changes_since(&baseline);
            match rise {
                PhysicalRise::Single(observed) if observed == expected => {
                    debug!(channel = channel.0, address = observed.0, "physical wiring confirmed");
                }
                PhysicalRise::Single(observed) => {
                    let warning = Warning::PhysicalMismatch {
                        channel,
                        expected,
                        observed,
                        observed_channel: mapping.logical_for(observed),
                        changes,
                    };
                    self.record_warning(report, warning)?;
                }
                PhysicalRise::Multiple(addresses) => {
                    let warning = Warning::AmbiguousRise {
                        channel,
                        addresses,
                        changes,
                    };
                    self.record_warning(report, warning)?;
                }
                PhysicalRise::None => {
                    info!(channel = channel.0, "no physical input rise observed");
                }
            }
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        if !self
            .sampler
            .wait_for_logical_state(&mut *self.operator, channel, true, remaining)?
        {
            info!(channel = channel.0, "active signal not observed");
            return self.decide(Failure::ActiveTimeout { channel });
        }

        info!(channel = channel.0, "signal confirmed");
        self.console.notify(&Event::SignalDetected { channel })?;

        // Release is best effort, a timeout here never prompts.
        if !self
            .sampler
            .wait_for_logical_state(&mut *self.operator, channel, false, timeout)?
        {
            debug!(channel = channel.0, "input not released before timeout");
        }
        Ok(ChannelStep::Passed)
    }

    /// Physical and logical baselines from the refresh that confirmed the inactive level.
    fn capture_baseline(&self, channel: LogicalChannel) -> Option<PhysicalSnapshot> {
        let di = self.operator.di_interface()?;
        let physical = di.physical_snapshot();
        let metadata = di.di_metadata();
        let logical = logical_snapshot(&metadata);
        debug!(
            channel = channel.0,
            ?physical,
            ?logical,
            "captured baselines"
        );
        Some(physical)
    }

    fn changes_since(&self, baseline: &PhysicalSnapshot) -> Vec<String> {
        self.operator
            .di_interface()
            .map(|di| describe_changes(baseline, &di.physical_snapshot()))
            .unwrap_or_default()
    }

    fn decide(&mut self, failure: Failure) -> Result<ChannelStep, DiagError> {
        let decision = self.console.ask_decision(&failure)?;
        debug!(channel = failure.channel().0, ?decision, "operator decision");
        Ok(decision.into())
    }

    /// Toggle every relay on then off, each step confirmed by the operator.
    ///
    /// Quitting while a relay is closed commands it open before returning.
    pub fn run_relay_phase(&mut self) -> Result<PhaseReport, DiagError> {
        let phase = Phase::Relays;
        let channels: Vec<LogicalChannel> = RELAY_CHANNELS.map(LogicalChannel).collect();
        let mut report = PhaseReport::new(phase);

        info!(channels = channels.len(), "starting relay phase");
        self.console.notify(&Event::PhaseStarted {
            phase,
            channels: channels.clone(),
        })?;

        for channel in channels {
            self.console.notify(&Event::RelayClosing { channel })?;
            self.operator.set_relay(channel, true)?;
            match self
                .console
                .ask_confirmation(&ConfirmRequest::RelayClosed { channel })
            {
                Ok(Confirmation::Confirmed) => {}
                Ok(Confirmation::Quit) => {
                    self.operator.set_relay(channel, false)?;
                    return self.finish(report, TestOutcome::Aborted);
                }
                Err(err) => {
                    if let Err(open_err) = self.operator.set_relay(channel, false) {
                        warn!(relay = channel.0, error = %open_err, "failed to open relay after console error");
                    }
                    return Err(err);
                }
            }

            self.console.notify(&Event::RelayOpening { channel })?;
            self.operator.set_relay(channel, false)?;
            if self
                .console
                .ask_confirmation(&ConfirmRequest::RelayOpened { channel })?
                == Confirmation::Quit
            {
                return self.finish(report, TestOutcome::Aborted);
            }

            info!(relay = channel.0, "relay confirmed");
            report.passed.push(channel);
        }

        self.finish(report, TestOutcome::Completed)
    }

    fn record_warning(&mut self, report: &mut PhaseReport, warning: Warning) -> Result<(), DiagError> {
        warn!(%warning, "diagnostic warning");
        self.console.notify(&Event::Warning(warning.clone()))?;
        report.warnings.push(warning);
        Ok(())
    }

    fn finish(
        &mut self,
        mut report: PhaseReport,
        outcome: TestOutcome,
    ) -> Result<PhaseReport, DiagError> {
        report.outcome = outcome;
        info!(
            phase = %report.phase,
            ?outcome,
            passed = report.passed.len(),
            skipped = report.skipped.len(),
            warnings = report.warnings.len(),
            "phase finished"
        );
        self.console.notify(&Event::PhaseFinished {
            phase: report.phase,
            outcome,
        })?;
        Ok(report)
    }
}
