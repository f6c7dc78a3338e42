use crate::DriverError;
use async_trait::async_trait;
use std::sync::Arc;

/// Register access used by the controller operator.
#[async_trait]
pub trait RegisterLink: Send + Sync {
    /// Read `quantity` discrete inputs starting at `start`.
    async fn read_discrete_inputs(&self, start: u16, quantity: u16) -> Result<Vec<bool>, DriverError>;

    async fn write_single_coil(&self, address: u16, value: bool) -> Result<(), DriverError>;
}

#[async_trait]
impl<L: RegisterLink + ?Sized> RegisterLink for Arc<L> {
    async fn read_discrete_inputs(&self, start: u16, quantity: u16) -> Result<Vec<bool>, DriverError> {
        (**self).read_discrete_inputs(start, quantity).await
    }

    async fn write_single_coil(&self, address: u16, value: bool) -> Result<(), DriverError> {
        (**self).write_single_coil(address, value).await
    }
}
