//! Raspberry Pi wiring: bringing the Si4703 up in 2-wire (I2C) mode.
//!
//! The chip latches its bus mode on the rising edge of RST. SDIO low at that moment selects
//! 2-wire mode, after which SDIO is handed back to the I2C controller as SDA.

use std::thread;
use std::time::Duration;

use rppal::gpio::{Gpio, IoPin, Mode, OutputPin};

/// Keeps the reset and SDIO pins claimed while the tuner is in use.
pub struct I2cMode {
    _reset: OutputPin,
    _sdio: IoPin,
}

/// Pulses RST with SDIO held low, then returns SDIO to its I2C function (ALT0).
pub fn enter_i2c_mode(reset_pin: u8, sdio_pin: u8) -> Result<I2cMode, rppal::gpio::Error> {
    let gpio = Gpio::new()?;

    let mut reset = gpio.get(reset_pin)?.into_output_low();
    let mut sdio = gpio.get(sdio_pin)?.into_io(Mode::Output);
    // Leave RST high and SDA on the I2C controller when the pins are dropped.
    reset.set_reset_on_drop(false);
    sdio.set_reset_on_drop(false);

    sdio.set_low();
    thread::sleep(Duration::from_millis(1));
    reset.set_high();
    thread::sleep(Duration::from_millis(1));
    sdio.set_mode(Mode::Alt0);

    log::debug!("board: Si4703 reset into I2C mode (RST=GPIO{reset_pin}, SDIO=GPIO{sdio_pin})");
    Ok(I2cMode {
        _reset: reset,
        _sdio: sdio,
    })
}
