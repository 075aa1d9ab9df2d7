//! Fixed-interval RDS polling client.
//!
//! [`RdsPoller`] powers the tuner up, tunes once and then forwards one [`RdsRecord`] per interval
//! to an [`RdsSink`] until its stop signal is raised.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::band::Channel;
use crate::err::Error;
use crate::rds::RdsRecord;
use crate::tuner::Si4703;

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 1_000;

/// Receives every polled record, empty ones included.
pub trait RdsSink {
    /// Called once per poll cycle.
    fn publish(&mut self, record: &RdsRecord);
}

impl<F> RdsSink for F
where
    F: FnMut(&RdsRecord),
{
    fn publish(&mut self, record: &RdsRecord) {
        self(record)
    }
}

/// What a finished polling run saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSummary {
    /// Completed read cycles.
    pub cycles: u32,
    /// Cycles that delivered an RDS group.
    pub groups: u32,
}

/// Drives a [`Si4703`] through initialize, tune and a read loop.
pub struct RdsPoller<'a, M: RawMutex, D> {
    delay: D,
    interval_ms: u32,
    stop: &'a Signal<M, ()>,
}

impl<'a, M: RawMutex, D: DelayNs> RdsPoller<'a, M, D> {
    /// Creates a poller that sleeps with `delay` and ends once `stop` is signalled.
    pub fn new(delay: D, stop: &'a Signal<M, ()>) -> Self {
        Self {
            delay,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stop,
        }
    }

    /// Sets the pause between two reads.
    pub fn with_interval_ms(mut self, interval_ms: u32) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Runs the polling loop on `tuner` until the stop signal is raised.
    ///
    /// An initialization failure is returned right away; there is no recovering from an
    /// uninitialized device. Tuning and read failures end the run as well. Once initialization
    /// has succeeded, the tuner is powered down however the run ends.
    pub async fn run<I2C, TD, E, S>(
        &mut self,
        tuner: &mut Si4703<I2C, TD>,
        channel: Channel,
        sink: &mut S,
    ) -> Result<PollSummary, Error<E>>
    where
        I2C: I2c<SevenBitAddress, Error = E>,
        E: embedded_hal_async::i2c::Error,
        TD: DelayNs,
        S: RdsSink,
    {
        tuner.initialize().await.inspect_err(|err| {
            log::error!("poller: tuner initialization failed: {err}");
        })?;

        let mut summary = PollSummary::default();
        let polled = self.poll(tuner, channel, sink, &mut summary).await;
        log::info!(
            "poller: stopped after {} cycles, {} RDS groups",
            summary.cycles,
            summary.groups
        );

        // The first failure wins over a failed power down.
        let powered_down = tuner.power_down().await;
        polled.and(powered_down).map(|()| summary)
    }

    /// Consumes the poller and returns its delay.
    pub fn into_inner(self) -> D {
        self.delay
    }

    async fn poll<I2C, TD, E, S>(
        &mut self,
        tuner: &mut Si4703<I2C, TD>,
        channel: Channel,
        sink: &mut S,
        summary: &mut PollSummary,
    ) -> Result<(), Error<E>>
    where
        I2C: I2c<SevenBitAddress, Error = E>,
        E: embedded_hal_async::i2c::Error,
        TD: DelayNs,
        S: RdsSink,
    {
        let tuned = tuner.tune_to_channel(channel).await.inspect_err(|err| {
            log::error!("poller: tuning to {channel} failed: {err}");
        })?;
        log::info!("poller: reading RDS on {tuned} every {} ms", self.interval_ms);

        let stop = self.stop;
        loop {
            if stop.signaled() {
                return Ok(());
            }

            let record = tuner.read_rds().await.inspect_err(|err| {
                log::error!("poller: RDS read failed after {} cycles: {err}", summary.cycles);
            })?;
            summary.cycles += 1;
            if !record.is_empty() {
                summary.groups += 1;
            }
            sink.publish(&record);

            let pause = self.delay.delay_ms(self.interval_ms);
            if let Either::Second(()) = select(pause, stop.wait()).await {
                return Ok(());
            }
        }
    }
}
