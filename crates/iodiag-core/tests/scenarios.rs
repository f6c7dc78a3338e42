use iodiag_core::{
    ConfirmRequest, Confirmation, ControllerOperator, Decision, DiInterface, DiPoint, DiagError,
    DiagnosticSequencer, Event, Failure, LogicalChannel, OperatorConsole, PhysicalAddress,
    PhysicalSnapshot, RunMode, SequencerConfig, TestOutcome, Warning,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Wiring bench shared by the fake controller and the scripted operator.
#[derive(Default)]
struct Bench {
    /// Metadata in controller order: (logical, reported physical address).
    metadata: Vec<(u16, Option<u16>)>,
    /// Physical bits that actually rise when the operator drives a channel.
    wiring: BTreeMap<u16, Vec<u16>>,
    logical: BTreeMap<u16, Option<bool>>,
    physical: BTreeMap<u16, bool>,
    /// Channels whose logical state never goes active.
    dead: BTreeSet<u16>,
    /// Channels the operator forgets to release after the signal is seen.
    stuck: BTreeSet<u16>,
    has_di: bool,
    refreshes: usize,
    relay_commands: Vec<(u16, bool)>,
}

impl Bench {
    fn identity() -> Self {
        let mut bench = Self {
            has_di: true,
            ..Self::default()
        };
        for ch in 0..=6 {
            bench.metadata.push((ch, Some(ch)));
            bench.wiring.insert(ch, vec![ch]);
            bench.logical.insert(ch, Some(false));
            bench.physical.insert(ch, false);
        }
        bench
    }

    fn press(&mut self, channel: u16) {
        for address in self.wiring.get(&channel).cloned().unwrap_or_default() {
            self.physical.insert(address, true);
        }
        if !self.dead.contains(&channel) {
            self.logical.insert(channel, Some(true));
        }
    }

    fn release(&mut self, channel: u16) {
        for address in self.wiring.get(&channel).cloned().unwrap_or_default() {
            self.physical.insert(address, false);
        }
        self.logical.insert(channel, Some(false));
    }
}

struct FakeController {
    bench: Rc<RefCell<Bench>>,
}

impl ControllerOperator for FakeController {
    fn refresh_points(&mut self) -> Result<(), DiagError> {
        self.bench.borrow_mut().refreshes += 1;
        Ok(())
    }

    fn read_logical_di(&self, channel: LogicalChannel) -> Option<bool> {
        self.bench
            .borrow()
            .logical
            .get(&channel.0)
            .copied()
            .flatten()
    }

    fn set_relay(&mut self, channel: LogicalChannel, value: bool) -> Result<(), DiagError> {
        self.bench
            .borrow_mut()
            .relay_commands
            .push((channel.0, value));
        Ok(())
    }

    fn di_interface(&self) -> Option<&dyn DiInterface> {
        if self.bench.borrow().has_di {
            Some(self)
        } else {
            None
        }
    }
}

impl DiInterface for FakeController {
    fn di_metadata(&self) -> Vec<(LogicalChannel, DiPoint)> {
        let bench = self.bench.borrow();
        bench
            .metadata
            .iter()
            .map(|(logical, physical)| {
                let state = bench.logical.get(logical).copied().flatten();
                (
                    LogicalChannel(*logical),
                    DiPoint::new(state, physical.map(PhysicalAddress)),
                )
            })
            .collect()
    }

    fn physical_snapshot(&self) -> PhysicalSnapshot {
        self.bench
            .borrow()
            .physical
            .iter()
            .map(|(address, value)| (PhysicalAddress(*address), *value))
            .collect()
    }
}

/// Operator that drives the bench on prompts and answers from a script.
struct ScriptedOperator {
    bench: Rc<RefCell<Bench>>,
    decisions: VecDeque<Decision>,
    confirmations: VecDeque<Confirmation>,
    events: Vec<Event>,
    failures: Vec<Failure>,
    active_since: Option<Instant>,
    /// Console input fails once the confirmations run out.
    fail_when_exhausted: bool,
    /// Time from each signal request to the decision prompt that followed it.
    prompt_delays: Vec<Duration>,
    /// Clears dead channels when the phase restarts.
    repair_on_restart: bool,
}

impl ScriptedOperator {
    fn new(bench: Rc<RefCell<Bench>>) -> Self {
        Self {
            bench,
            decisions: VecDeque::new(),
            confirmations: VecDeque::new(),
            events: Vec::new(),
            failures: Vec::new(),
            active_since: None,
            fail_when_exhausted: false,
            prompt_delays: Vec::new(),
            repair_on_restart: false,
        }
    }

    fn warnings(&self) -> Vec<&Warning> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Warning(warning) => Some(warning),
                _ => None,
            })
            .collect()
    }

    fn inactive_order(&self) -> Vec<u16> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::AwaitInactive { channel } => Some(channel.0),
                _ => None,
            })
            .collect()
    }
}

impl OperatorConsole for ScriptedOperator {
    fn notify(&mut self, event: &Event) -> Result<(), DiagError> {
        match event {
            Event::AwaitActive { channel, .. } => {
                self.active_since = Some(Instant::now());
                self.bench.borrow_mut().press(channel.0);
            }
            Event::SignalDetected { channel } => {
                let mut bench = self.bench.borrow_mut();
                if !bench.stuck.contains(&channel.0) {
                    bench.release(channel.0);
                }
            }
            Event::PhaseRestarted { .. } if self.repair_on_restart => {
                self.bench.borrow_mut().dead.clear();
            }
            _ => {}
        }
        self.events.push(event.clone());
        Ok(())
    }

    fn ask_decision(&mut self, failure: &Failure) -> Result<Decision, DiagError> {
        let channel = failure.channel().0;
        self.failures.push(*failure);
        if let (Failure::ActiveTimeout { .. }, Some(since)) = (failure, self.active_since) {
            self.prompt_delays.push(since.elapsed());
        }
        // A failed channel is left released before answering.
        self.bench.borrow_mut().release(channel);
        Ok(self.decisions.pop_front().unwrap_or(Decision::Quit))
    }

    fn ask_confirmation(&mut self, _request: &ConfirmRequest) -> Result<Confirmation, DiagError> {
        match self.confirmations.pop_front() {
            Some(confirmation) => Ok(confirmation),
            None if self.fail_when_exhausted => {
                Err(DiagError::Console(io::Error::other("console closed")))
            }
            None => Ok(Confirmation::Confirmed),
        }
    }
}

fn config() -> SequencerConfig {
    SequencerConfig::default()
        .with_timeout(Duration::from_millis(100))
        .with_poll_interval(Duration::from_millis(1))
}

fn rig(bench: Bench) -> (Rc<RefCell<Bench>>, FakeController, ScriptedOperator) {
    let bench = Rc::new(RefCell::new(bench));
    let controller = FakeController {
        bench: Rc::clone(&bench),
    };
    let operator = ScriptedOperator::new(Rc::clone(&bench));
    (bench, controller, operator)
}

fn channels(values: &[u16]) -> Vec<LogicalChannel> {
    values.iter().copied().map(LogicalChannel).collect()
}

#[test]
fn identity_mapping_completes_without_warnings() {
    let (_bench, mut controller, mut operator) = rig(Bench::identity());

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Completed);
    assert!(report.warnings.is_empty());
    assert_eq!(report.passed, channels(&[0, 1, 2, 3, 4, 5, 6]));
    assert!(report.skipped.is_empty());
    assert_eq!(report.restarts, 0);
    assert!(operator.failures.is_empty());
    assert!(operator.warnings().is_empty());
}

#[test]
fn simultaneous_rise_warns_but_channel_passes() {
    let mut bench = Bench::identity();
    bench.wiring.insert(0, vec![0, 1]);
    let (_bench, mut controller, mut operator) = rig(bench);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Completed);
    assert!(report.passed.contains(&LogicalChannel(0)));
    assert_eq!(report.warnings.len(), 1);
    match &report.warnings[0] {
        Warning::AmbiguousRise {
            channel, addresses, ..
        } => {
            assert_eq!(*channel, LogicalChannel(0));
            assert_eq!(addresses, &vec![PhysicalAddress(0), PhysicalAddress(1)]);
        }
        other => panic!("unexpected warning: {other:?}"),
    }
}

#[test]
fn transposed_wire_warns_but_logical_check_passes() {
    let mut bench = Bench {
        has_di: true,
        ..Bench::default()
    };
    bench.metadata = vec![(0, Some(0)), (1, Some(1)), (2, Some(5))];
    bench.wiring.insert(0, vec![0]);
    bench.wiring.insert(1, vec![1]);
    bench.wiring.insert(2, vec![7]);
    for ch in 0..=2 {
        bench.logical.insert(ch, Some(false));
    }
    for address in [0, 1, 5, 7] {
        bench.physical.insert(address, false);
    }
    let (_bench, mut controller, mut operator) = rig(bench);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Completed);
    assert_eq!(report.passed, channels(&[0, 1, 2]));
    assert_eq!(report.warnings.len(), 1);
    match &report.warnings[0] {
        Warning::PhysicalMismatch {
            channel,
            expected,
            observed,
            observed_channel,
            changes,
        } => {
            assert_eq!(*channel, LogicalChannel(2));
            assert_eq!(*expected, PhysicalAddress(5));
            assert_eq!(*observed, PhysicalAddress(7));
            assert_eq!(*observed_channel, None);
            assert_eq!(changes, &vec!["7:0->1".to_string()]);
        }
        other => panic!("unexpected warning: {other:?}"),
    }
    // Reported before the channel was confirmed.
    let warning_at = operator
        .events
        .iter()
        .position(|event| matches!(event, Event::Warning(_)))
        .unwrap();
    let confirmed_at = operator
        .events
        .iter()
        .position(|event| {
            matches!(event, Event::SignalDetected { channel } if *channel == LogicalChannel(2))
        })
        .unwrap();
    assert!(warning_at < confirmed_at);
}

#[test]
fn quit_after_timeout_aborts_run() {
    let mut bench = Bench::identity();
    bench.logical.insert(0, None);
    let (bench, mut controller, mut operator) = rig(bench);
    operator.decisions.push_back(Decision::Quit);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run(RunMode::Full)
        .unwrap();

    let di = report.discrete_inputs.as_ref().unwrap();
    assert_eq!(di.outcome, TestOutcome::Aborted);
    assert!(di.passed.is_empty());
    assert!(report.relays.is_none());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(
        operator.failures,
        vec![Failure::InactiveTimeout {
            channel: LogicalChannel(0)
        }]
    );
    assert!(bench.borrow().relay_commands.is_empty());
}

#[test]
fn retry_restarts_from_first_channel() {
    let mut bench = Bench::identity();
    bench.dead.insert(2);
    let (_bench, mut controller, mut operator) = rig(bench);
    operator.decisions.push_back(Decision::Retry);
    operator.repair_on_restart = true;

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Completed);
    assert_eq!(report.restarts, 1);
    assert_eq!(report.passed, channels(&[0, 1, 2, 3, 4, 5, 6]));
    assert_eq!(
        operator.failures,
        vec![Failure::ActiveTimeout {
            channel: LogicalChannel(2)
        }]
    );
    assert_eq!(operator.inactive_order(), vec![0, 1, 2, 0, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn retry_on_inactive_timeout_also_restarts_phase() {
    let mut bench = Bench::identity();
    bench.logical.insert(1, Some(true));
    let (bench, mut controller, mut operator) = rig(bench);
    operator.decisions.push_back(Decision::Retry);
    operator.decisions.push_back(Decision::Quit);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    // Operator releases channel 1 when prompted, so the second pass gets past it.
    assert_eq!(report.outcome, TestOutcome::Completed);
    assert_eq!(report.restarts, 1);
    assert_eq!(&operator.inactive_order()[..3], &[0, 1, 0]);
    assert!(bench.borrow().refreshes > 0);
}

#[test]
fn skip_advances_one_channel() {
    let mut bench = Bench::identity();
    bench.dead.insert(3);
    let (_bench, mut controller, mut operator) = rig(bench);
    operator.decisions.push_back(Decision::Skip);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Completed);
    assert_eq!(report.skipped, channels(&[3]));
    assert_eq!(report.passed, channels(&[0, 1, 2, 4, 5, 6]));
    assert!(operator.events.contains(&Event::ChannelSkipped {
        channel: LogicalChannel(3)
    }));
    assert!(!operator.events.contains(&Event::SignalDetected {
        channel: LogicalChannel(3)
    }));
}

#[test]
fn remapped_inputs_are_tested_in_physical_order() {
    let mut bench = Bench::identity();
    bench.metadata = vec![(0, Some(7))];
    for ch in 1..=6 {
        bench.metadata.push((ch, Some(ch - 1)));
    }
    bench.wiring.clear();
    bench.physical.clear();
    for (logical, physical) in bench.metadata.clone() {
        let physical = physical.unwrap();
        bench.wiring.insert(logical, vec![physical]);
        bench.physical.insert(physical, false);
    }
    let (_bench, mut controller, mut operator) = rig(bench);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Completed);
    assert!(report.warnings.is_empty());
    assert_eq!(operator.inactive_order(), vec![1, 2, 3, 4, 5, 6, 0]);
}

#[test]
fn duplicate_physical_address_is_reported_and_not_tested() {
    let mut bench = Bench::identity();
    bench.metadata = vec![(0, Some(0)), (1, Some(0)), (2, Some(2))];
    let (_bench, mut controller, mut operator) = rig(bench);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.passed, channels(&[0, 2]));
    assert_eq!(
        report.warnings,
        vec![Warning::DuplicateMapping {
            kept_channel: LogicalChannel(0),
            kept_address: PhysicalAddress(0),
            dropped_channel: LogicalChannel(1),
            dropped_address: PhysicalAddress(0),
        }]
    );
}

#[test]
fn without_di_interface_falls_back_to_default_channels() {
    let mut bench = Bench::identity();
    bench.has_di = false;
    let (_bench, mut controller, mut operator) = rig(bench);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Completed);
    assert_eq!(report.passed, channels(&[0, 1, 2, 3, 4, 5, 6]));
    assert!(operator.events.contains(&Event::AwaitActive {
        channel: LogicalChannel(0),
        expected_address: None,
    }));
}

#[test]
fn relay_quit_while_closed_opens_relay_first() {
    let (bench, mut controller, mut operator) = rig(Bench::identity());
    operator.confirmations.extend([
        Confirmation::Confirmed,
        Confirmation::Confirmed,
        Confirmation::Quit,
    ]);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_relay_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Aborted);
    assert_eq!(report.passed, channels(&[1]));
    assert_eq!(
        bench.borrow().relay_commands,
        vec![(1, true), (1, false), (2, true), (2, false)]
    );
}

#[test]
fn console_failure_while_closed_opens_relay() {
    let (bench, mut controller, mut operator) = rig(Bench::identity());
    operator.confirmations.extend([Confirmation::Confirmed, Confirmation::Confirmed]);
    operator.fail_when_exhausted = true;

    let err = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_relay_phase()
        .unwrap_err();

    assert!(matches!(err, DiagError::Console(_)));
    assert_eq!(
        bench.borrow().relay_commands,
        vec![(1, true), (1, false), (2, true), (2, false)]
    );
}

#[test]
fn relay_quit_while_open_sends_nothing_more() {
    let (bench, mut controller, mut operator) = rig(Bench::identity());
    operator
        .confirmations
        .extend([Confirmation::Confirmed, Confirmation::Quit]);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_relay_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Aborted);
    assert!(report.passed.is_empty());
    assert_eq!(bench.borrow().relay_commands, vec![(1, true), (1, false)]);
}

#[test]
fn full_run_completes_both_phases() {
    let (bench, mut controller, mut operator) = rig(Bench::identity());

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run(RunMode::Full)
        .unwrap();

    assert!(report.is_completed());
    assert_eq!(report.exit_code(), 0);
    let relays = report.relays.as_ref().unwrap();
    assert_eq!(relays.passed, channels(&[1, 2, 3, 4, 5, 6]));

    let commands = bench.borrow().relay_commands.clone();
    let expected: Vec<(u16, bool)> = (1..=6).flat_map(|ch| [(ch, true), (ch, false)]).collect();
    assert_eq!(commands, expected);
}

#[test]
fn relays_only_mode_skips_di_phase() {
    let (bench, mut controller, mut operator) = rig(Bench::identity());

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run(RunMode::RelaysOnly)
        .unwrap();

    assert!(report.discrete_inputs.is_none());
    assert!(report.is_completed());
    assert_eq!(bench.borrow().refreshes, 0);
}

#[test]
fn missing_signal_prompts_within_one_timeout() {
    let mut bench = Bench::identity();
    bench.dead.insert(0);
    bench.wiring.remove(&0);
    let (_bench, mut controller, mut operator) = rig(bench);
    let timeout = Duration::from_millis(300);
    let config = config().with_timeout(timeout);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config)
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Aborted);
    assert_eq!(
        operator.failures,
        vec![Failure::ActiveTimeout {
            channel: LogicalChannel(0)
        }]
    );
    assert_eq!(operator.prompt_delays.len(), 1);
    let delay = operator.prompt_delays[0];
    assert!(delay >= timeout, "prompted early after {delay:?}");
    assert!(delay < timeout * 3 / 2, "prompted late after {delay:?}");
}

#[test]
fn input_left_active_after_signal_still_passes() {
    let mut bench = Bench::identity();
    bench.stuck.insert(3);
    let (bench, mut controller, mut operator) = rig(bench);

    let report = DiagnosticSequencer::new(&mut controller, &mut operator, config())
        .run_di_phase()
        .unwrap();

    assert_eq!(report.outcome, TestOutcome::Completed);
    assert_eq!(report.passed, channels(&[0, 1, 2, 3, 4, 5, 6]));
    assert!(operator.failures.is_empty());
    assert!(operator.decisions.is_empty());
    assert_eq!(bench.borrow().logical.get(&3), Some(&Some(true)));
}
