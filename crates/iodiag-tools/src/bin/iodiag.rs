use clap::{Parser, ValueEnum};
use iodiag_core::{DiagnosticSequencer, PhaseReport, RunMode, RunReport, SequencerConfig};
use iodiag_driver::ControllerModel;
use iodiag_tools::common::{SerialConnectionArgs, build_operator, init_tracing};
use iodiag_tools::console::LineConsole;
use std::io;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Full,
    Di,
    Relays,
}

impl From<ModeArg> for RunMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Full => RunMode::Full,
            ModeArg::Di => RunMode::DiOnly,
            ModeArg::Relays => RunMode::RelaysOnly,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "iodiag", about = "Interactive DI and relay wiring check for Modbus RTU controllers")]
struct Args {
    #[command(flatten)]
    conn: SerialConnectionArgs,
    #[arg(long, value_enum, default_value_t = ModeArg::Full)]
    mode: ModeArg,
    #[arg(long, default_value = "wb_mr6lv")]
    model: String,
    /// Seconds to wait for each expected input state.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,
}

fn print_summary(report: &RunReport) {
    println!();
    for phase in report.phases() {
        print_phase(phase);
    }
    if report.is_completed() {
        println!("Diagnostics finished.");
    } else {
        println!("Diagnostics aborted.");
    }
}

fn print_phase(phase: &PhaseReport) {
    let list = |channels: &[iodiag_core::LogicalChannel]| {
        channels
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!(
        "{} test: {:?}, passed [{}], skipped [{}], restarts {}",
        phase.phase,
        phase.outcome,
        list(&phase.passed),
        list(&phase.skipped),
        phase.restarts
    );
    for warning in &phase.warnings {
        println!("  warning: {warning}");
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut operator = build_operator(&args.conn, &args.model)?;
    info!(
        model = operator.model().name,
        known_models = ?ControllerModel::names().collect::<Vec<_>>(),
        "controller ready"
    );

    let config = SequencerConfig::default()
        .with_timeout(Duration::from_secs(args.timeout))
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));
    let mut console = LineConsole::new(io::stdin().lock(), io::stdout());

    let report =
        DiagnosticSequencer::new(&mut operator, &mut console, config).run(args.mode.into())?;
    print_summary(&report);
    Ok(ExitCode::from(report.exit_code()))
}
