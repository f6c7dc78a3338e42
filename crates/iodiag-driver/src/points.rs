use crate::DriverError;

/// Cached bit block starting at a register address.
///
/// Every bit is unknown until a read covering it has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPoints {
    start_address: u16,
    values: Vec<Option<bool>>,
}

impl BitPoints {
    pub fn new(start_address: u16, count: usize) -> Self {
        Self {
            start_address,
            values: vec![None; count],
        }
    }

    /// `None` when out of range or not read yet.
    pub fn get(&self, address: u16) -> Option<bool> {
        let offset = usize::from(address.checked_sub(self.start_address)?);
        self.values.get(offset).copied().flatten()
    }

    pub fn set(&mut self, address: u16, value: bool) -> Result<(), DriverError> {
        let offset = usize::from(
            address
                .checked_sub(self.start_address)
                .ok_or(DriverError::InvalidResponse("bit address out of range"))?,
        );
        let slot = self
            .values
            .get_mut(offset)
            .ok_or(DriverError::InvalidResponse("bit address out of range"))?;
        *slot = Some(value);
        Ok(())
    }

    pub fn apply_read(&mut self, start_address: u16, values: &[bool]) -> Result<(), DriverError> {
        for (i, value) in values.iter().copied().enumerate() {
            let offset =
                u16::try_from(i).map_err(|_| DriverError::InvalidResponse("bit read too long"))?;
            let addr = start_address
                .checked_add(offset)
                .ok_or(DriverError::InvalidResponse("bit address overflow"))?;
            self.set(addr, value)?;
        }
        Ok(())
    }

    /// Addresses with a known value, ascending.
    pub fn known(&self) -> impl Iterator<Item = (u16, bool)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(move |(offset, value)| {
                let address = self.start_address.checked_add(u16::try_from(offset).ok()?)?;
                value.map(|value| (address, value))
            })
    }
}
