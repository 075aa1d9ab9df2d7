#![no_std]
#![doc = "Asynchronous I2C bus adapters for embedded-hal."]

// Note: the shared device mirrors what embassy-embedded-hal offers, without pulling in its
// dependency tree for a single I2C peripheral.
//
// For the official Embassy implementation, see:
// - https://github.com/embassy-rs/embassy/tree/main/embassy-embedded-hal/src/shared_bus

pub mod i2c;
