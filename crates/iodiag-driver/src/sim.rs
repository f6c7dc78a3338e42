use crate::{DriverError, RegisterLink};
use async_trait::async_trait;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_modbus::ExceptionCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBank {
    values: Vec<bool>,
}

impl BitBank {
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![false; size],
        }
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        self.values.get(index).copied()
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<(), DriverError> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(DriverError::Exception(ExceptionCode::IllegalDataAddress))?;
        *slot = value;
        Ok(())
    }

    fn range(&self, start: u16, quantity: u16) -> Option<&[bool]> {
        let start = usize::from(start);
        let end = start.checked_add(usize::from(quantity))?;
        self.values.get(start..end)
    }
}

#[derive(Debug)]
struct SimulatedIo {
    discrete_inputs: BitBank,
    coils: BitBank,
}

/// In-memory discrete inputs and coils behind the [`RegisterLink`] interface.
#[derive(Debug)]
pub struct SimulatedRegisterLink {
    io: RwLock<SimulatedIo>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    pending_failures: AtomicUsize,
}

impl SimulatedRegisterLink {
    pub fn new(discrete_input_count: usize, coil_count: usize) -> Self {
        Self {
            io: RwLock::new(SimulatedIo {
                discrete_inputs: BitBank::new(discrete_input_count),
                coils: BitBank::new(coil_count),
            }),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            pending_failures: AtomicUsize::new(0),
        }
    }

    pub fn set_discrete_input(&self, address: u16, value: bool) -> Result<(), DriverError> {
        self.io
            .write()
            .expect("simulated io lock poisoned")
            .discrete_inputs
            .set(usize::from(address), value)
    }

    pub fn discrete_input(&self, address: u16) -> Option<bool> {
        self.io
            .read()
            .expect("simulated io lock poisoned")
            .discrete_inputs
            .get(usize::from(address))
    }

    pub fn coil(&self, address: u16) -> Option<bool> {
        self.io
            .read()
            .expect("simulated io lock poisoned")
            .coils
            .get(usize::from(address))
    }

    /// Make the next `count` requests fail with a timeout.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::Relaxed);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn take_failure(&self) -> Result<(), DriverError> {
        let failed = self
            .pending_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DriverError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl RegisterLink for SimulatedRegisterLink {
    async fn read_discrete_inputs(&self, start: u16, quantity: u16) -> Result<Vec<bool>, DriverError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        let io = self.io.read().expect("simulated io lock poisoned");
        io.discrete_inputs
            .range(start, quantity)
            .map(<[bool]>::to_vec)
            .ok_or(DriverError::Exception(ExceptionCode::IllegalDataAddress))
    }

    async fn write_single_coil(&self, address: u16, value: bool) -> Result<(), DriverError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        self.io
            .write()
            .expect("simulated io lock poisoned")
            .coils
            .set(usize::from(address), value)
    }
}
