//! An asynchronous, `no_std` driver for the Silicon Labs Si4703 FM tuner with RDS.
//!
//! This crate provides a `Si4703` driver to interact with the tuner over I2C. It powers the
//! chip up, tunes and seeks within a regional band plan, and reads RDS groups as the chip
//! receives them. `RdsPoller` builds the classic smoke test on top of it: initialize, tune
//! once, then hand one RDS record per interval to a sink until told to stop.
//!
//! # Usage
//!
//! You need an I2C peripheral implementation that satisfies the
//! `embedded-hal-async::i2c::I2c` trait and a delay implementing
//! `embedded-hal-async::delay::DelayNs`. On Linux, `embedded_bus_async::i2c::BlockingI2c`
//! lifts a blocking bus into the async trait.
//!
//! ```no_run
//! # async fn demo() {
//! use si4703_async::sim::{InstantDelay, SimulatedSi4703};
//! use si4703_async::{Channel, Config, Si4703};
//!
//! let mut tuner = Si4703::new(SimulatedSi4703::new(), InstantDelay::new(), Config::default());
//! tuner.initialize().await.unwrap();
//! tuner.tune_to_channel(Channel::from_tenths_mhz(927)).await.unwrap();
//!
//! loop {
//!     if let Ok(record) = tuner.read_rds().await {
//!         log::info!("{record}");
//!     }
//! }
//! # }
//! ```
//!
//! The Si4703 must be put into I2C mode before the first transaction: SDIO has to be low while
//! RST rises. That is board wiring and lives with the application, see the
//! `si4703-rds-poller` crate for a Raspberry Pi version.

#![no_std]

pub mod band;
pub mod conf;
pub mod err;
pub mod poller;
pub mod rds;
pub mod reg;
#[cfg(feature = "simulator")]
pub mod sim;

mod tuner;

pub use band::{Band, BandPlan, Channel, Spacing};
pub use conf::Config;
pub use err::{Error, InitError};
pub use poller::{PollSummary, RdsPoller, RdsSink};
pub use rds::{RdsGroup, RdsRecord};
pub use tuner::*;
