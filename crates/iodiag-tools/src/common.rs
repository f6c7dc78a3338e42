use clap::{Args, ValueEnum};
use iodiag_driver::rtu::{data_bits, stop_bits};
use iodiag_driver::{
    ControllerModel, DriverError, ModbusControllerOperator, OperatorConfig, RtuRegisterLink,
    SerialSettings,
};
use std::time::Duration;
use tokio_serial::Parity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

impl From<ParityArg> for Parity {
    fn from(value: ParityArg) -> Self {
        match value {
            ParityArg::None => Parity::None,
            ParityArg::Even => Parity::Even,
            ParityArg::Odd => Parity::Odd,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SerialConnectionArgs {
    /// Serial device, e.g. /dev/ttyRS485-1
    #[arg(long)]
    pub device: String,
    #[arg(long)]
    pub slave_id: u8,
    #[arg(long, default_value_t = 9600)]
    pub baudrate: u32,
    #[arg(long, default_value_t = 2)]
    pub stopbits: u8,
    #[arg(long, default_value_t = 8)]
    pub bytesize: u8,
    #[arg(long, value_enum, default_value_t = ParityArg::None)]
    pub parity: ParityArg,
    /// Per-request response timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub response_timeout_ms: u64,
    #[arg(long, default_value_t = 1)]
    pub retries: u8,
}

impl SerialConnectionArgs {
    pub fn serial_settings(&self) -> Result<SerialSettings, DriverError> {
        Ok(SerialSettings::new(self.device.clone(), self.slave_id)
            .with_baud_rate(self.baudrate)
            .with_data_bits(data_bits(self.bytesize)?)
            .with_stop_bits(stop_bits(self.stopbits)?)
            .with_parity(self.parity.into()))
    }

    pub fn operator_config(&self) -> OperatorConfig {
        OperatorConfig::default()
            .with_response_timeout(Duration::from_millis(self.response_timeout_ms))
            .with_retry_count(self.retries)
    }
}

pub fn build_operator(
    args: &SerialConnectionArgs,
    model: &str,
) -> Result<ModbusControllerOperator<RtuRegisterLink>, DriverError> {
    let model = ControllerModel::lookup(model)?;
    ModbusControllerOperator::connect(&args.serial_settings()?, model, args.operator_config())
}

/// Logs go to stderr so they never interleave with operator prompts.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
