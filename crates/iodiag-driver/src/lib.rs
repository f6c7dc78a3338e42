//! Modbus RTU controller operator for the iodiag engine.
//!
//! Implements [`iodiag_core::ControllerOperator`] and
//! [`iodiag_core::DiInterface`] on top of a [`RegisterLink`], which is either a
//! serial RTU connection or the in-memory [`SimulatedRegisterLink`].

#![forbid(unsafe_code)]

pub mod link;
pub mod model;
pub mod operator;
pub mod points;
pub mod rtu;
pub mod sim;

pub use link::RegisterLink;
pub use model::ControllerModel;
pub use operator::{ModbusControllerOperator, OperatorConfig, RetryPolicy};
pub use points::BitPoints;
pub use rtu::{RtuRegisterLink, SerialSettings};
pub use sim::SimulatedRegisterLink;

use iodiag_core::DiagError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to open serial port '{path}': {source}")]
    SerialOpen {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },
    #[error("runtime init error: {0}")]
    RuntimeInit(std::io::Error),
    #[error("modbus transport error: {0}")]
    Transport(#[from] tokio_modbus::Error),
    #[error("modbus exception: {0:?}")]
    Exception(tokio_modbus::ExceptionCode),
    #[error("request timed out")]
    Timeout,
    #[error("unknown controller model: {0}")]
    UnknownModel(String),
    #[error("relay {0} does not exist on this controller")]
    UnknownRelay(u16),
    #[error("unsupported serial setting: {0}")]
    InvalidSetting(String),
    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),
}

impl DriverError {
    /// Errors worth another attempt on the same link.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl From<DriverError> for DiagError {
    fn from(err: DriverError) -> Self {
        DiagError::transport(err)
    }
}
