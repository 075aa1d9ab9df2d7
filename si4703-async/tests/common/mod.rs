//! Shared setup for the driver tests.
//!
//! The simulated chip sits behind a mutex and reaches the driver through a
//! `SharedI2cDevice`, so a test can queue RDS groups and inspect registers while the driver
//! still owns its bus handle.

#![allow(dead_code)]

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_bus_async::i2c::SharedI2cDevice;
use si4703_async::sim::{InstantDelay, SimulatedSi4703};
use si4703_async::{Channel, Config, Si4703};

pub type SimBus = Mutex<CriticalSectionRawMutex, SimulatedSi4703>;
pub type SimTuner<'a> =
    Si4703<SharedI2cDevice<'a, CriticalSectionRawMutex, SimulatedSi4703>, InstantDelay>;

/// Time spent settling the oscillator and powering up.
pub const POWER_UP_MS: u64 = 610;

pub fn mhz(tenths: u16) -> Channel {
    Channel::from_tenths_mhz(tenths)
}

pub fn sim_bus(chip: SimulatedSi4703) -> SimBus {
    Mutex::new(chip)
}

pub fn tuner(bus: &SimBus, config: Config) -> SimTuner<'_> {
    Si4703::new(SharedI2cDevice::new(bus), InstantDelay::new(), config)
}

pub fn initialized(bus: &SimBus, config: Config) -> SimTuner<'_> {
    let mut tuner = tuner(bus, config);
    block_on(tuner.initialize()).expect("initialize");
    tuner
}

pub fn tuned_to(bus: &SimBus, channel: Channel, config: Config) -> SimTuner<'_> {
    let mut tuner = initialized(bus, config);
    block_on(tuner.tune_to_channel(channel)).expect("tune");
    tuner
}

/// Runs `f` on the simulated chip between two driver calls.
pub fn with_chip<R>(bus: &SimBus, f: impl FnOnce(&mut SimulatedSi4703) -> R) -> R {
    let mut chip = bus.try_lock().expect("bus is idle between driver calls");
    f(&mut *chip)
}
