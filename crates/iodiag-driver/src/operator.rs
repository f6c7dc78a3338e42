use crate::model::ControllerModel;
use crate::points::BitPoints;
use crate::rtu::{RtuRegisterLink, SerialSettings};
use crate::{DriverError, RegisterLink};
use iodiag_core::{
    ControllerOperator, DiInterface, DiPoint, DiagError, LogicalChannel, PhysicalAddress,
    PhysicalSnapshot,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Never,
    /// Retry input reads, never relay writes.
    ReadOnly,
    All,
}

#[derive(Debug, Clone, Copy)]
pub struct OperatorConfig {
    pub response_timeout: Duration,
    pub retry_count: u8,
    pub retry_policy: RetryPolicy,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(500),
            retry_count: 1,
            retry_policy: RetryPolicy::ReadOnly,
        }
    }
}

impl OperatorConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u8) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    fn retries(&self, write: bool) -> bool {
        match self.retry_policy {
            RetryPolicy::Never => false,
            RetryPolicy::ReadOnly => !write,
            RetryPolicy::All => true,
        }
    }
}

/// Blocking controller operator over an async [`RegisterLink`].
///
/// Owns its own tokio runtime so the sequencer can stay synchronous.
pub struct ModbusControllerOperator<L> {
    runtime: Runtime,
    link: L,
    model: &'static ControllerModel,
    config: OperatorConfig,
    inputs: BitPoints,
    relays: BTreeMap<LogicalChannel, bool>,
}

impl ModbusControllerOperator<RtuRegisterLink> {
    /// Open the serial port described by `settings`.
    pub fn connect(
        settings: &SerialSettings,
        model: &'static ControllerModel,
        config: OperatorConfig,
    ) -> Result<Self, DriverError> {
        let runtime = build_runtime()?;
        let link = {
            let _guard = runtime.enter();
            RtuRegisterLink::open(settings)?
        };
        info!(
            device = %settings.device,
            unit_id = settings.unit_id,
            baud_rate = settings.baud_rate,
            model = model.name,
            "serial link opened"
        );
        Ok(Self::with_runtime(runtime, link, model, config))
    }
}

impl<L: RegisterLink> ModbusControllerOperator<L> {
    pub fn new(
        link: L,
        model: &'static ControllerModel,
        config: OperatorConfig,
    ) -> Result<Self, DriverError> {
        Ok(Self::with_runtime(build_runtime()?, link, model, config))
    }

    fn with_runtime(
        runtime: Runtime,
        link: L,
        model: &'static ControllerModel,
        config: OperatorConfig,
    ) -> Self {
        let (start, count) = model.input_block;
        Self {
            runtime,
            link,
            model,
            config,
            inputs: BitPoints::new(start, usize::from(count)),
            relays: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &'static ControllerModel {
        self.model
    }

    pub fn config(&self) -> OperatorConfig {
        self.config
    }

    /// Last commanded state of each relay.
    pub fn relay_states(&self) -> &BTreeMap<LogicalChannel, bool> {
        &self.relays
    }

    pub fn refresh(&mut self) -> Result<(), DriverError> {
        let (start, count) = self.model.input_block;
        let link = &self.link;
        let values = self.runtime.block_on(exchange(
            self.config,
            false,
            "read_discrete_inputs",
            || link.read_discrete_inputs(start, count),
        ))?;
        self.inputs.apply_read(start, &values)?;
        debug!(start, count, "discrete inputs refreshed");
        Ok(())
    }

    pub fn write_relay(&mut self, channel: LogicalChannel, value: bool) -> Result<(), DriverError> {
        let coil = self
            .model
            .relay_coil(channel)
            .ok_or(DriverError::UnknownRelay(channel.0))?;
        let link = &self.link;
        self.runtime.block_on(exchange(
            self.config,
            true,
            "write_single_coil",
            || link.write_single_coil(coil, value),
        ))?;
        self.relays.insert(channel, value);
        info!(relay = channel.0, coil, value, "relay commanded");
        Ok(())
    }
}

fn build_runtime() -> Result<Runtime, DriverError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(DriverError::RuntimeInit)
}

async fn exchange<T, F, Fut>(
    config: OperatorConfig,
    write: bool,
    operation: &'static str,
    mut request: F,
) -> Result<T, DriverError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DriverError>>,
{
    let attempts = usize::from(config.retry_count) + 1;
    let retry_eligible = config.retries(write);

    for attempt in 1..=attempts {
        let err = match timeout(config.response_timeout, request()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => DriverError::Timeout,
        };
        if attempt < attempts && retry_eligible && err.is_retryable() {
            warn!(operation, attempt, error = %err, "retrying modbus request");
            continue;
        }
        return Err(err);
    }
    Err(DriverError::InvalidResponse("retry loop exhausted"))
}

impl<L: RegisterLink> ControllerOperator for ModbusControllerOperator<L> {
    fn refresh_points(&mut self) -> Result<(), DiagError> {
        Ok(self.refresh()?)
    }

    fn read_logical_di(&self, channel: LogicalChannel) -> Option<bool> {
        let address = self.model.physical_address(channel)?;
        self.inputs.get(address.0)
    }

    fn set_relay(&mut self, channel: LogicalChannel, value: bool) -> Result<(), DiagError> {
        Ok(self.write_relay(channel, value)?)
    }

    fn di_interface(&self) -> Option<&dyn DiInterface> {
        Some(self)
    }
}

impl<L: RegisterLink> DiInterface for ModbusControllerOperator<L> {
    fn di_metadata(&self) -> Vec<(LogicalChannel, DiPoint)> {
        self.model
            .inputs()
            .map(|(channel, address)| {
                (channel, DiPoint::new(self.inputs.get(address.0), Some(address)))
            })
            .collect()
    }

    fn physical_snapshot(&self) -> PhysicalSnapshot {
        self.inputs
            .known()
            .map(|(address, value)| (PhysicalAddress(address), value))
            .collect()
    }
}
