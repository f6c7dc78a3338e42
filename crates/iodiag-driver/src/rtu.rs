use crate::{DriverError, RegisterLink};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_modbus::client::{Context, rtu};
use tokio_modbus::prelude::{Reader, Slave, Writer};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::trace;

/// Serial line and unit addressing for an RTU controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub device: String,
    pub unit_id: u8,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl SerialSettings {
    /// 9600 baud, 8 data bits, no parity, 2 stop bits.
    pub fn new(device: impl Into<String>, unit_id: u8) -> Self {
        Self {
            device: device.into(),
            unit_id,
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::Two,
            parity: Parity::None,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }
}

pub fn data_bits(bits: u8) -> Result<DataBits, DriverError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(DriverError::InvalidSetting(format!("byte size {other}"))),
    }
}

pub fn stop_bits(bits: u8) -> Result<StopBits, DriverError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(DriverError::InvalidSetting(format!("stop bits {other}"))),
    }
}

/// Modbus RTU client over a serial port.
pub struct RtuRegisterLink {
    ctx: Mutex<Context>,
    unit_id: u8,
}

impl RtuRegisterLink {
    /// Open the port and attach to the configured unit.
    ///
    /// Must run inside a tokio runtime context.
    pub fn open(settings: &SerialSettings) -> Result<Self, DriverError> {
        let stream = tokio_serial::new(settings.device.as_str(), settings.baud_rate)
            .parity(settings.parity)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|source| DriverError::SerialOpen {
                path: settings.device.clone(),
                source,
            })?;
        let ctx = rtu::attach_slave(stream, Slave(settings.unit_id));
        Ok(Self {
            ctx: Mutex::new(ctx),
            unit_id: settings.unit_id,
        })
    }
}

#[async_trait]
impl RegisterLink for RtuRegisterLink {
    async fn read_discrete_inputs(&self, start: u16, quantity: u16) -> Result<Vec<bool>, DriverError> {
        let mut ctx = self.ctx.lock().await;
        trace!(unit_id = self.unit_id, start, quantity, "reading discrete inputs");
        let values = ctx
            .read_discrete_inputs(start, quantity)
            .await?
            .map_err(DriverError::Exception)?;
        if values.len() < usize::from(quantity) {
            return Err(DriverError::InvalidResponse(
                "discrete input payload shorter than requested",
            ));
        }
        Ok(values)
    }

    async fn write_single_coil(&self, address: u16, value: bool) -> Result<(), DriverError> {
        let mut ctx = self.ctx.lock().await;
        trace!(unit_id = self.unit_id, address, value, "writing coil");
        ctx.write_single_coil(address, value)
            .await?
            .map_err(DriverError::Exception)?;
        Ok(())
    }
}
