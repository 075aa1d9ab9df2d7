//! I2C adapters for driving async device drivers from the buses you actually have.
//!
//! - [`BlockingI2c`] lifts a blocking `embedded-hal` bus (a Linux `/dev/i2c-*` handle, for
//!   example) into the async `I2c` trait.
//! - [`SharedI2cDevice`] lets several drivers use one bus, one transaction at a time.

use embassy_sync::{blocking_mutex::raw::RawMutex, mutex::Mutex};
use embedded_hal::i2c::{Operation, SevenBitAddress};
use embedded_hal_async::i2c::{self, I2c};

/// Async facade over a blocking [`embedded_hal::i2c::I2c`] bus.
///
/// Each transaction runs to completion on the calling task. That is the right trade-off for
/// buses that are already backed by a kernel driver, where the transfer itself blocks anyway.
pub struct BlockingI2c<T> {
    inner: T,
}

impl<T> BlockingI2c<T>
where
    T: embedded_hal::i2c::I2c<SevenBitAddress>,
{
    /// Wraps a blocking bus.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Returns the wrapped bus.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> i2c::ErrorType for BlockingI2c<T>
where
    T: embedded_hal::i2c::I2c<SevenBitAddress>,
{
    type Error = T::Error;
}

impl<T> i2c::I2c for BlockingI2c<T>
where
    T: embedded_hal::i2c::I2c<SevenBitAddress>,
{
    async fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.inner.transaction(address, operations)
    }
}

/// `Mutex`-based shared bus [`I2c`] device.
///
/// Every device handed out for the same bus holds the lock for exactly one transaction, so
/// register sequences of different drivers never interleave mid-transfer.
pub struct SharedI2cDevice<'a, M: RawMutex, BUS> {
    bus: &'a Mutex<M, BUS>,
}

impl<'a, M: RawMutex, BUS> SharedI2cDevice<'a, M, BUS> {
    /// Create a new [`SharedI2cDevice`].
    pub fn new(bus: &'a Mutex<M, BUS>) -> Self {
        Self { bus }
    }
}

impl<M: RawMutex, BUS> i2c::ErrorType for SharedI2cDevice<'_, M, BUS>
where
    BUS: i2c::ErrorType,
{
    type Error = BUS::Error;
}

impl<M: RawMutex, BUS> i2c::I2c for SharedI2cDevice<'_, M, BUS>
where
    BUS: I2c<SevenBitAddress>,
{
    async fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        let result = bus.transaction(address, operations).await;

        if let Err(err) = &result {
            log::warn!("Error communicating with I2C device {address:#04x}: {err:?}");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embedded_hal::i2c::ErrorKind;
    use std::vec::Vec;

    /// Blocking bus that echoes a counter on reads and records every write.
    #[derive(Default)]
    struct RecordingBus {
        writes: Vec<(u8, Vec<u8>)>,
        reads: u8,
        fail: bool,
    }

    impl embedded_hal::i2c::ErrorType for RecordingBus {
        type Error = ErrorKind;
    }

    impl embedded_hal::i2c::I2c for RecordingBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Bus);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            self.reads += 1;
                            *byte = self.reads;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn blocking_adapter_forwards_transactions() {
        let mut bus = BlockingI2c::new(RecordingBus::default());
        let mut buf = [0u8; 3];

        block_on(async {
            bus.write(0x10, &[0xAA, 0x55]).await.unwrap();
            bus.read(0x10, &mut buf).await.unwrap();
        });

        assert_eq!(buf, [1, 2, 3]);
        let inner = bus.into_inner();
        assert_eq!(inner.writes, [(0x10, std::vec![0xAA, 0x55])]);
    }

    #[test]
    fn blocking_adapter_surfaces_bus_errors() {
        let mut bus = BlockingI2c::new(RecordingBus {
            fail: true,
            ..Default::default()
        });

        let result = block_on(bus.write(0x10, &[0x00]));
        assert_eq!(result, Err(ErrorKind::Bus));
    }

    #[test]
    fn shared_devices_use_the_same_bus() {
        let bus: Mutex<CriticalSectionRawMutex, _> =
            Mutex::new(BlockingI2c::new(RecordingBus::default()));
        let mut tuner = SharedI2cDevice::new(&bus);
        let mut sensor = SharedI2cDevice::new(&bus);

        block_on(async {
            tuner.write(0x10, &[0x01]).await.unwrap();
            sensor.write(0x48, &[0x02]).await.unwrap();
            tuner.write(0x10, &[0x03]).await.unwrap();
        });

        let writes = bus.into_inner().into_inner().writes;
        assert_eq!(
            writes,
            [
                (0x10, std::vec![0x01]),
                (0x48, std::vec![0x02]),
                (0x10, std::vec![0x03]),
            ]
        );
    }
}
